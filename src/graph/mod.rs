mod fragment;
mod store;

pub use fragment::{EdgeUpdate, Fragment, NodeUpdate};
pub use store::{Edge, EdgeReport, FragmentReport, GraphSize, GraphStore, Node, NodeId, UpsertReport};
