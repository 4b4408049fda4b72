pub mod bounded_queue;
pub mod rw_lock;

pub use bounded_queue::BoundedQueue;
pub use rw_lock::RwLock;
