pub mod ethereum;
pub mod memory_source;
pub mod mock_chain;
pub mod subgraph;
