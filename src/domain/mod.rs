pub mod forecast;
pub mod records;
pub mod scenario;

pub use forecast::*;
pub use records::*;
pub use scenario::*;
