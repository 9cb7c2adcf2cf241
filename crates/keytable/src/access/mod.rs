mod batch;
mod layer;

#[cfg(test)]
mod tests;

pub use batch::check_batch;
pub use layer::TableAccessLayer;
