mod service;

pub use service::InMemoryDataService;
