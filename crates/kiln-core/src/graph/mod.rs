//! Concrete dependency graphs
//!
//! A solved assignment is reconciled into a [`ConcreteGraph`]: one node per
//! package instance, typed edges, content hashes, and lazy traversals.

mod dag;
mod hash;
mod reconcile;

pub use dag::{
    ConcreteEdge, ConcreteGraph, ConcreteNode, DependencyDocument, GraphDocument, NodeDocument,
    NodeId, Traversal, TraversalOrder,
};
pub use hash::node_hash;
pub use reconcile::Reconciler;
