//! Serialization definition for [`Signature`] and [`Bigraph`].
//!
//! Identifiers in a serialized bigraph only relate its entities to each other:
//! loading assigns fresh identities, so documents can be loaded repeatedly and
//! combined without clashes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use super::graph::{EdgeData, Graph, InnerNameData, NodeData, OuterNameData, RootData, SiteData};
use super::{Bigraph, ValidationError};
use crate::core::{
    Child, Edge, Entity, Handle, InnerName, Node, OuterName, Parent, Point, Port, Root, Site,
};
use crate::ids::IdGenerator;
use crate::signature::{Control, Signature, SignatureBuilder, SignatureError};

/// A wrapper over the available serialization formats.
///
/// Make sure to order the variants from newest to oldest, as the deserializer
/// will try to deserialize them in order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "version", rename_all = "lowercase")]
enum Versioned<T> {
    /// Version 1 of the serialization format.
    V1(T),

    #[serde(other)]
    Unsupported,
}

impl<T> Versioned<T> {
    fn new(t: T) -> Self {
        Self::V1(t)
    }

    fn into_latest<E: serde::de::Error>(self) -> Result<T, E> {
        match self {
            Versioned::V1(t) => Ok(t),
            Versioned::Unsupported => Err(E::custom("Unsupported serialization format.")),
        }
    }
}

/// Version 1 of the signature format.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct SerSignatureV1 {
    id: SmolStr,
    controls: Vec<Control>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct SerSite {
    id: Site,
    parent: Parent,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct SerNode {
    id: Node,
    control: SmolStr,
    parent: Parent,
    ports: Vec<Handle>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct SerOuterName {
    id: OuterName,
    name: SmolStr,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct SerInnerName {
    id: InnerName,
    name: SmolStr,
    handle: Handle,
}

/// Version 1 of the bigraph format.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct SerBigraphV1 {
    signature: SerSignatureV1,
    /// Roots, in order.
    roots: Vec<Root>,
    /// Sites, in order.
    #[serde(default)]
    sites: Vec<SerSite>,
    #[serde(default)]
    nodes: Vec<SerNode>,
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(default)]
    outer_names: Vec<SerOuterName>,
    #[serde(default)]
    inner_names: Vec<SerInnerName>,
}

/// Errors that can occur while loading a serialized bigraph.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum SerializationError {
    /// The signature is malformed.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// An entity is declared twice.
    #[error("{0} is declared twice.")]
    DuplicateId(Entity),
    /// A reference to an entity that is not declared.
    #[error("{0} is referenced but not declared.")]
    UnknownReference(Entity),
    /// A node has a control missing from the signature.
    #[error("Control {0} is not in the signature.")]
    UnknownControl(SmolStr),
    /// The loaded bigraph breaks an invariant.
    #[error("Invalid bigraph: {0}")]
    Invalid(#[from] ValidationError),
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Versioned::new(SerSignatureV1::from(self)).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Signature, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ser: SerSignatureV1 =
            Versioned::deserialize(deserializer)?.into_latest::<D::Error>()?;
        ser.try_into().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Bigraph {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Versioned::new(SerBigraphV1::from(self)).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bigraph {
    fn deserialize<D>(deserializer: D) -> Result<Bigraph, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ser: SerBigraphV1 =
            Versioned::deserialize(deserializer)?.into_latest::<D::Error>()?;
        ser.try_into().map_err(serde::de::Error::custom)
    }
}

impl From<&Signature> for SerSignatureV1 {
    fn from(sig: &Signature) -> Self {
        Self {
            id: sig.id().clone(),
            controls: sig.controls().cloned().collect(),
        }
    }
}

impl TryFrom<SerSignatureV1> for Signature {
    type Error = SignatureError;

    fn try_from(ser: SerSignatureV1) -> Result<Self, Self::Error> {
        let mut sb = SignatureBuilder::new();
        for control in ser.controls {
            sb.add(control)?;
        }
        Ok(sb.make_signature(Some(&ser.id)))
    }
}

impl From<&Bigraph> for SerBigraphV1 {
    fn from(bigraph: &Bigraph) -> Self {
        let g = &bigraph.graph;
        Self {
            signature: g.signature.as_ref().into(),
            roots: g.roots.keys().copied().collect(),
            sites: g
                .sites
                .iter()
                .map(|(&id, d)| SerSite {
                    id,
                    parent: d.parent,
                })
                .collect(),
            nodes: g
                .nodes
                .iter()
                .map(|(&id, d)| SerNode {
                    id,
                    control: d.control.name().clone(),
                    parent: d.parent,
                    ports: d.ports.clone(),
                })
                .collect(),
            edges: g.edges.keys().copied().collect(),
            outer_names: g
                .outer_names
                .iter()
                .map(|(&id, d)| SerOuterName {
                    id,
                    name: d.name.clone(),
                })
                .collect(),
            inner_names: g
                .inner_names
                .iter()
                .map(|(&id, d)| SerInnerName {
                    id,
                    name: d.name.clone(),
                    handle: d.handle,
                })
                .collect(),
        }
    }
}

/// Fresh identities for the identifiers of a document.
#[derive(Default)]
struct Rekey {
    roots: HashMap<Root, Root>,
    nodes: HashMap<Node, Node>,
    edges: HashMap<Edge, Edge>,
    outer_names: HashMap<OuterName, OuterName>,
}

impl Rekey {
    fn parent(&self, parent: Parent) -> Result<Parent, SerializationError> {
        let unknown = || SerializationError::UnknownReference(parent.into());
        Ok(match parent {
            Parent::Root(r) => Parent::Root(*self.roots.get(&r).ok_or_else(unknown)?),
            Parent::Node(n) => Parent::Node(*self.nodes.get(&n).ok_or_else(unknown)?),
        })
    }

    fn handle(&self, handle: Handle) -> Result<Handle, SerializationError> {
        let unknown = || SerializationError::UnknownReference(handle.into());
        Ok(match handle {
            Handle::Edge(e) => Handle::Edge(*self.edges.get(&e).ok_or_else(unknown)?),
            Handle::OuterName(o) => {
                Handle::OuterName(*self.outer_names.get(&o).ok_or_else(unknown)?)
            }
        })
    }
}

/// Inserts `key` with a fresh value, failing if it was already present.
fn declare<K: Copy + std::hash::Hash + Eq + Into<Entity>, V>(
    map: &mut HashMap<K, V>,
    key: K,
    fresh: V,
) -> Result<V, SerializationError>
where
    V: Copy,
{
    if map.insert(key, fresh).is_some() {
        return Err(SerializationError::DuplicateId(key.into()));
    }
    Ok(fresh)
}

impl TryFrom<SerBigraphV1> for Bigraph {
    type Error = SerializationError;

    fn try_from(ser: SerBigraphV1) -> Result<Self, Self::Error> {
        let signature = Arc::new(Signature::try_from(ser.signature)?);
        let mut ids = IdGenerator::new();
        let mut graph = Graph::new(signature.clone(), ids.owner());
        let mut rekey = Rekey::default();

        for root in ser.roots {
            let fresh = declare(&mut rekey.roots, root, ids.root())?;
            graph.roots.insert(fresh, RootData::default());
        }
        for edge in ser.edges {
            let fresh = declare(&mut rekey.edges, edge, ids.edge())?;
            graph.edges.insert(fresh, EdgeData::default());
        }
        for outer in ser.outer_names {
            let fresh = declare(&mut rekey.outer_names, outer.id, ids.outer_name())?;
            graph.outer_names.insert(
                fresh,
                OuterNameData {
                    name: outer.name,
                    points: Default::default(),
                },
            );
        }
        // Nodes may be listed before their parents: declare them all first.
        let mut nodes = Vec::with_capacity(ser.nodes.len());
        for node in ser.nodes {
            let fresh = declare(&mut rekey.nodes, node.id, ids.node())?;
            let control = signature
                .get(&node.control)
                .cloned()
                .ok_or_else(|| SerializationError::UnknownControl(node.control.clone()))?;
            nodes.push((fresh, control, node));
        }
        for (fresh, control, node) in nodes {
            let parent = rekey.parent(node.parent)?;
            let ports = node
                .ports
                .iter()
                .map(|&h| rekey.handle(h))
                .collect::<Result<Vec<_>, _>>()?;
            for (i, &h) in ports.iter().enumerate() {
                graph.points_mut(h).insert(Point::Port(Port::new(fresh, i)));
            }
            graph.nodes.insert(
                fresh,
                NodeData {
                    control,
                    parent,
                    children: Default::default(),
                    ports,
                },
            );
        }
        let parents: Vec<_> = graph.nodes.iter().map(|(&n, d)| (n, d.parent)).collect();
        for (node, parent) in parents {
            graph.children_mut(parent).insert(Child::Node(node));
        }
        let mut sites: HashMap<Site, Site> = HashMap::new();
        for site in ser.sites {
            let fresh = declare(&mut sites, site.id, ids.site())?;
            let parent = rekey.parent(site.parent)?;
            graph.sites.insert(fresh, SiteData { parent });
            graph.children_mut(parent).insert(Child::Site(fresh));
        }
        let mut inner_names: HashMap<InnerName, InnerName> = HashMap::new();
        for inner in ser.inner_names {
            let fresh = declare(&mut inner_names, inner.id, ids.inner_name())?;
            let handle = rekey.handle(inner.handle)?;
            graph.points_mut(handle).insert(Point::InnerName(fresh));
            graph.inner_names.insert(
                fresh,
                InnerNameData {
                    name: inner.name,
                    handle,
                },
            );
        }

        let bigraph = Bigraph { graph };
        bigraph.validate()?;
        Ok(bigraph)
    }
}
