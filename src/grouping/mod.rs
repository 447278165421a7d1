pub mod decision;
pub mod resolver;

pub use decision::Decision;
pub use resolver::GroupingResolver;
