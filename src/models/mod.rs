pub mod message;
pub mod tool;
pub mod run;

pub use message::*;
pub use tool::*;
pub use run::*;
