pub mod net;
pub mod priority_queue;
pub mod sequence;

pub use priority_queue::PriorityQueue;
pub use sequence::SequenceCounter;
