//! Strategies for random bigraphs over the `net` test signature.

use ::proptest::collection::vec;
use ::proptest::prelude::*;
use smol_str::SmolStr;

use crate::bigraph::test::net_signature;
use crate::bigraph::{Bigraph, BigraphBuilder, BigraphView};
use crate::core::{Handle, Parent, Port};

/// Number of edges the links of a random bigraph are spread over.
const EDGE_SLOTS: usize = 3;

/// Upper bound on the number of nodes of a random bigraph.
const MAX_NODES: usize = 6;

const CONTROLS: [&str; 3] = ["router", "lan", "ip"];

/// Random choices from which a bigraph is built.
///
/// Every choice is an arbitrary number reduced modulo the options available
/// when it is used, so any value leads to a well-formed bigraph.
#[derive(Clone, Debug)]
struct Layout {
    /// Control, parent and port links of each node.
    nodes: Vec<(usize, usize, Vec<usize>)>,
    /// Parent of each site.
    sites: Vec<usize>,
    /// Link of each inner name.
    inner: Vec<usize>,
}

/// A strategy for bigraphs with the given faces.
///
/// The outer face is `<width, outer>` and the inner face `<sites, inner>`.
/// Sites need somewhere to go, so `width` must be positive when `sites` is.
pub fn any_bigraph(
    width: usize,
    sites: usize,
    outer: &[&str],
    inner: &[&str],
) -> impl Strategy<Value = Bigraph> {
    assert!(width > 0 || sites == 0);
    let outer: Vec<SmolStr> = outer.iter().map(|&n| n.into()).collect();
    let inner: Vec<SmolStr> = inner.iter().map(|&n| n.into()).collect();
    let max_nodes = if width == 0 { 0 } else { MAX_NODES };
    let node = (0..CONTROLS.len(), any::<usize>(), vec(any::<usize>(), 2));
    (
        vec(node, 0..=max_nodes),
        vec(any::<usize>(), sites),
        vec(any::<usize>(), inner.len()),
    )
        .prop_map(move |(nodes, sites, links)| {
            let layout = Layout {
                nodes,
                sites,
                inner: links,
            };
            build(width, &outer, &inner, &layout)
        })
}

/// A strategy for ground bigraphs with one root and no names.
pub fn any_agent() -> impl Strategy<Value = Bigraph> {
    any_bigraph(1, 0, &[], &[])
}

fn build(width: usize, outer: &[SmolStr], inner: &[SmolStr], layout: &Layout) -> Bigraph {
    let mut b = BigraphBuilder::new(net_signature());
    let roots: Vec<Parent> = (0..width).map(|_| b.add_root().into()).collect();
    let names: Vec<Handle> = outer
        .iter()
        .map(|n| b.add_outer_name(n.clone()).unwrap().into())
        .collect();
    let mut places = roots;
    let mut edges: [Option<Handle>; EDGE_SLOTS] = [None; EDGE_SLOTS];

    for (control, parent, links) in &layout.nodes {
        let parent = places[parent % places.len()];
        let node = b.add_node(CONTROLS[*control], parent).unwrap();
        let arity = b.control(node).arity();
        for (i, link) in links.iter().take(arity).enumerate() {
            let port = Port::new(node, i);
            let slot = link % (names.len() + EDGE_SLOTS);
            if slot < names.len() {
                b.relink(port, names[slot]).unwrap();
            } else {
                match edges[slot - names.len()] {
                    Some(edge) => b.relink(port, edge).unwrap(),
                    None => edges[slot - names.len()] = Some(b.handle(port)),
                }
            }
        }
        places.push(node.into());
    }

    for parent in &layout.sites {
        b.add_site(places[parent % places.len()]).unwrap();
    }

    for (name, link) in inner.iter().zip(&layout.inner) {
        let slot = link % (names.len() + EDGE_SLOTS);
        if slot < names.len() {
            b.add_inner_name_with_handle(name.clone(), names[slot]).unwrap();
        } else {
            match edges[slot - names.len()] {
                Some(edge) => {
                    b.add_inner_name_with_handle(name.clone(), edge).unwrap();
                }
                None => {
                    let y = b.add_inner_name(name.clone()).unwrap();
                    edges[slot - names.len()] = Some(b.handle(y));
                }
            }
        }
    }
    b.make_bigraph()
}

mod test {
    use ::proptest::prelude::*;

    use super::{any_agent, any_bigraph};
    use crate::bigraph::test::net_signature;
    use crate::bigraph::{Bigraph, BigraphView, Interface, Replicable};
    use crate::matching::{Matcher, MatcherConfig};

    proptest! {
        #[test]
        fn generated_bigraphs_are_valid(g in any_bigraph(2, 2, &["x", "y"], &["z"])) {
            prop_assert!(g.validate().is_ok());
            prop_assert_eq!(g.outer_face(), Interface::new(2, ["x", "y"]));
            prop_assert_eq!(g.inner_face(), Interface::new(2, ["z"]));
        }

        #[test]
        fn composition_identities(f in any_bigraph(2, 1, &["x", "y"], &["z"])) {
            let left = Bigraph::identity(net_signature(), 2, ["x", "y"]).unwrap();
            let right = Bigraph::identity(net_signature(), 1, ["z"]).unwrap();
            prop_assert!(left.compose(f.clone()).unwrap().is_equivalent(&f));
            prop_assert!(f.clone().compose(right).unwrap().is_equivalent(&f));
        }

        #[test]
        fn composition_is_associative(
            f in any_bigraph(1, 1, &["x"], &["y"]),
            g in any_bigraph(1, 2, &["y"], &["z"]),
            h in any_bigraph(2, 0, &["z"], &[]),
        ) {
            let left = f.clone().compose(g.clone()).unwrap().compose(h.clone()).unwrap();
            let right = f.compose(g.compose(h).unwrap()).unwrap();
            prop_assert!(left.is_equivalent(&right));
        }

        #[test]
        fn empty_is_a_unit(f in any_bigraph(2, 1, &["x"], &["y"])) {
            let empty = || Bigraph::empty(net_signature());
            prop_assert!(f.clone().juxtapose(empty()).unwrap().is_equivalent(&f));
            prop_assert!(empty().juxtapose(f.clone()).unwrap().is_equivalent(&f));
        }

        #[test]
        fn replicas_are_disjoint(f in any_bigraph(1, 1, &["x"], &["y"])) {
            let copy = f.replicate();
            prop_assert!(copy.is_equivalent(&f));
            prop_assert!(copy.nodes().all(|n| !f.contains_node(n)));
            prop_assert!(copy.edges().all(|e| !f.contains_edge(e)));
        }

        #[test]
        fn serialization_preserves_shape(f in any_bigraph(2, 1, &["x"], &["y"])) {
            let json = serde_json::to_string(&f).unwrap();
            let loaded: Bigraph = serde_json::from_str(&json).unwrap();
            prop_assert!(loaded.is_equivalent(&f));
        }

        #[test]
        fn matches_recompose_the_agent(
            agent in any_agent(),
            open in any_bigraph(1, 1, &["x"], &[]),
            linked in any_bigraph(1, 2, &["x", "w"], &["y"]),
        ) {
            let matcher = Matcher::with_config(MatcherConfig {
                respect_passive: false,
                max_matches: Some(16),
            });
            for redex in [open, linked] {
                for m in matcher.matches(&agent, &redex).unwrap() {
                    let whole = m.recompose().unwrap();
                    prop_assert!(whole.is_equivalent(&agent));
                }
            }
        }

        #[test]
        fn agents_are_ground(a in any_agent()) {
            prop_assert!(a.is_ground());
        }
    }
}
