mod memory;


pub use memory::InMemorySessionService;
