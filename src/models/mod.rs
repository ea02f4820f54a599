pub mod approval;
pub mod content;
pub mod references;

pub use approval::*;
pub use content::*;
pub use references::*;
