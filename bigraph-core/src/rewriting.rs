//! Reaction rules: replacing the occurrences of a redex with a reactum.
//!
//! A [`RewritingRule`] pairs a redex and a reactum with the same outer face
//! and inner names, and an [`InstantiationMap`] telling, for each site of the
//! reactum, which redex site's parameter it receives. A parameter may be used
//! several times, in which case every use after the first is a replica, or
//! not at all, in which case it is dropped.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;
use tracing::{debug, trace};

use crate::bigraph::{Bigraph, BigraphBuilder, BigraphError, BigraphView, Interface, Replicable};
use crate::ids::IdGenerator;
use crate::matching::{CandidateWeight, Match, MatchError, Matcher, MatcherConfig, Matches};

/// Maps each reactum site to the redex site whose parameter it receives.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstantiationMap {
    map: Vec<usize>,
}

impl InstantiationMap {
    /// Creates a map from the redex site index of each reactum site.
    pub fn new(map: impl IntoIterator<Item = usize>) -> Self {
        Self {
            map: map.into_iter().collect(),
        }
    }

    /// The map sending each of the `width` sites to itself.
    pub fn identity(width: usize) -> Self {
        Self::new(0..width)
    }

    /// Number of reactum sites covered by the map.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the map covers no site.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The redex site sent to the given reactum site.
    pub fn get(&self, site: usize) -> Option<usize> {
        self.map.get(site).copied()
    }

    /// The redex site of each reactum site, in order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.map.iter().copied()
    }

    /// Arranges parameters for the reactum sites.
    ///
    /// The first use of a parameter is the parameter itself; every other use
    /// is an independent replica.
    pub fn instantiate(
        &self,
        params: &[Bigraph],
        ids: &mut IdGenerator,
    ) -> Result<Vec<Bigraph>, RuleError> {
        let mut used = vec![false; params.len()];
        self.map
            .iter()
            .enumerate()
            .map(|(site, &index)| {
                let param = params.get(index).ok_or(RuleError::InstantiationOutOfRange {
                    site,
                    index,
                    width: params.len(),
                })?;
                Ok(if std::mem::replace(&mut used[index], true) {
                    param.replicate_with(ids)
                } else {
                    param.clone()
                })
            })
            .collect()
    }
}

impl FromIterator<usize> for InstantiationMap {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<usize>> for InstantiationMap {
    fn from(map: Vec<usize>) -> Self {
        Self { map }
    }
}

/// Errors raised when building or applying a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RuleError {
    /// The redex and the reactum are defined over different signatures.
    #[error("Signature mismatch: the redex is over {redex}, the reactum over {reactum}.")]
    SignatureMismatch {
        /// Identifier of the signature of the redex.
        redex: SmolStr,
        /// Identifier of the signature of the reactum.
        reactum: SmolStr,
    },
    /// The redex and the reactum have different outer faces.
    #[error("Outer face mismatch: the redex has {redex}, the reactum {reactum}.")]
    InterfaceMismatch {
        /// Outer face of the redex.
        redex: Interface,
        /// Outer face of the reactum.
        reactum: Interface,
    },
    /// The redex and the reactum have different inner names.
    #[error("Inner names mismatch: the redex has {redex:?}, the reactum {reactum:?}.")]
    InnerNameMismatch {
        /// Inner names of the redex.
        redex: BTreeSet<SmolStr>,
        /// Inner names of the reactum.
        reactum: BTreeSet<SmolStr>,
    },
    /// The instantiation map does not cover the reactum sites.
    #[error("The instantiation map covers {found} sites but the reactum has {expected}.")]
    InstantiationLength {
        /// Number of reactum sites.
        expected: usize,
        /// Length of the map.
        found: usize,
    },
    /// The instantiation map refers to a missing redex site.
    #[error("Reactum site {site} is sent to redex site {index}, but the redex has {width} sites.")]
    InstantiationOutOfRange {
        /// The reactum site.
        site: usize,
        /// The redex site it is sent to.
        index: usize,
        /// Number of redex sites.
        width: usize,
    },
    /// The matcher could not run on the agent.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// Assembling a successor failed.
    #[error(transparent)]
    Bigraph(#[from] BigraphError),
}

/// A reaction rule `redex → reactum`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "SerRule", into = "SerRule")]
pub struct RewritingRule {
    redex: Bigraph,
    reactum: Bigraph,
    instantiation: InstantiationMap,
    matcher: Matcher,
}

impl RewritingRule {
    /// Creates a rule, checking that the two sides fit.
    pub fn new(
        redex: Bigraph,
        reactum: Bigraph,
        instantiation: InstantiationMap,
    ) -> Result<Self, RuleError> {
        if redex.signature() != reactum.signature() {
            return Err(RuleError::SignatureMismatch {
                redex: redex.signature().id().clone(),
                reactum: reactum.signature().id().clone(),
            });
        }
        let (redex_face, reactum_face) = (redex.outer_face(), reactum.outer_face());
        if redex_face != reactum_face {
            return Err(RuleError::InterfaceMismatch {
                redex: redex_face,
                reactum: reactum_face,
            });
        }
        let (redex_names, reactum_names) = (redex.inner_face().names, reactum.inner_face().names);
        if redex_names != reactum_names {
            return Err(RuleError::InnerNameMismatch {
                redex: redex_names,
                reactum: reactum_names,
            });
        }
        let width = reactum.sites().len();
        if instantiation.len() != width {
            return Err(RuleError::InstantiationLength {
                expected: width,
                found: instantiation.len(),
            });
        }
        let params = redex.sites().len();
        if let Some((site, index)) = instantiation.iter().enumerate().find(|(_, i)| *i >= params) {
            return Err(RuleError::InstantiationOutOfRange {
                site,
                index,
                width: params,
            });
        }
        Ok(Self {
            redex,
            reactum,
            instantiation,
            matcher: Matcher::new(),
        })
    }

    /// Uses the given configuration when looking for matches in [`RewritingRule::apply`].
    pub fn with_config(mut self, config: MatcherConfig) -> Self {
        self.matcher = Matcher::with_config(config);
        self
    }

    /// The left-hand side.
    pub fn redex(&self) -> &Bigraph {
        &self.redex
    }

    /// The right-hand side.
    pub fn reactum(&self) -> &Bigraph {
        &self.reactum
    }

    /// The instantiation map.
    pub fn instantiation(&self) -> &InstantiationMap {
        &self.instantiation
    }

    /// Arranges the parameters of a match for the reactum.
    ///
    /// The result has one root per reactum site and the outer names of
    /// [`Match::param`], idle if no parameter uses them.
    pub fn instantiate(&self, m: &Match) -> Result<Bigraph, RuleError> {
        self.instantiate_with(m, &mut IdGenerator::new())
    }

    fn instantiate_with(&self, m: &Match, ids: &mut IdGenerator) -> Result<Bigraph, RuleError> {
        let parts = self.instantiation.instantiate(m.params(), ids)?;
        let mut b = BigraphBuilder::with_ids(self.redex.signature().clone(), ids.clone());
        for name in m.param().outer_face().names {
            b.add_outer_name(name)?;
        }
        let mut param = b.into_bigraph();
        for part in parts {
            param = param.parallel_product(part)?;
        }
        Ok(param)
    }

    /// Replaces the redex image of a match with a fresh copy of the reactum.
    ///
    /// Computes `context ∘ (reactum ‖ identity) ∘ instantiated parameters`.
    pub fn apply_match(&self, m: &Match) -> Result<Bigraph, RuleError> {
        let mut ids = IdGenerator::new();
        let param = self.instantiate_with(m, &mut ids)?;
        let reactum = self.reactum.replicate_with(&mut ids);
        let image = reactum.juxtapose(m.identity().clone())?;
        let successor = m.context().clone().compose(image)?.compose(param)?;
        trace!(nodes = successor.num_nodes(), "rule applied");
        Ok(successor)
    }

    /// Lazily computes the successors of `agent`, one per match.
    ///
    /// Successors are not deduplicated: distinct matches give distinct
    /// successors even when these are equivalent.
    pub fn apply<'a>(&'a self, agent: &'a Bigraph) -> Result<Rewrites<'a>, RuleError> {
        self.apply_with(&self.matcher, agent)
    }

    /// Like [`RewritingRule::apply`], with a matcher of the caller's choosing.
    pub fn apply_with<'a, W: CandidateWeight>(
        &'a self,
        matcher: &'a Matcher<W>,
        agent: &'a Bigraph,
    ) -> Result<Rewrites<'a, W>, RuleError> {
        let matches = matcher.matches(agent, &self.redex)?;
        debug!(agent_nodes = agent.num_nodes(), "applying rule");
        Ok(Rewrites {
            rule: self,
            matches,
            produced: 0,
        })
    }
}

/// The lazy sequence of successors returned by [`RewritingRule::apply`].
pub struct Rewrites<'a, W = crate::matching::Unweighted> {
    rule: &'a RewritingRule,
    matches: Matches<'a, W>,
    produced: usize,
}

impl<W: CandidateWeight> Iterator for Rewrites<'_, W> {
    type Item = Result<Bigraph, RuleError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.matches.next() {
            Some(m) => {
                self.produced += 1;
                Some(self.rule.apply_match(&m))
            }
            None => {
                debug!(successors = self.produced, "rule exhausted");
                None
            }
        }
    }
}

/// Serialized form of a rule.
#[derive(Serialize, Deserialize)]
struct SerRule {
    redex: Bigraph,
    reactum: Bigraph,
    instantiation: InstantiationMap,
    #[serde(default)]
    matcher: MatcherConfig,
}

impl TryFrom<SerRule> for RewritingRule {
    type Error = RuleError;

    fn try_from(ser: SerRule) -> Result<Self, Self::Error> {
        Ok(Self::new(ser.redex, ser.reactum, ser.instantiation)?.with_config(ser.matcher))
    }
}

impl From<RewritingRule> for SerRule {
    fn from(rule: RewritingRule) -> Self {
        Self {
            redex: rule.redex,
            reactum: rule.reactum,
            instantiation: rule.instantiation,
            matcher: rule.matcher.config().clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;
    use crate::bigraph::test::{net, net_signature, network};
    use crate::core::{Node, Port};

    /// `root{lan[x]{site...}}`, or `root{lan[x]{lan{site...}}}` when wrapped.
    fn lan(sites: usize, wrapped: bool) -> Bigraph {
        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let x = b.add_outer_name("x").unwrap();
        let mut lan = b.add_node_with_handles("lan", root, &[x.into()]).unwrap();
        if wrapped {
            lan = b.add_node("lan", lan).unwrap();
        }
        for _ in 0..sites {
            b.add_site(lan).unwrap();
        }
        b.make_bigraph()
    }

    #[test]
    fn wrap_lan() {
        let (agent, [router, lan_node, ip]) = network();
        let rule =
            RewritingRule::new(lan(1, false), lan(1, true), InstantiationMap::new([0])).unwrap();
        let successors: Vec<Bigraph> = rule
            .apply(&agent)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(successors.len(), 1);
        let next = &successors[0];
        assert_eq!(next.num_nodes(), agent.num_nodes() + 1);
        assert!(next.validate().is_ok());
        assert!(next.contains_node(router) && next.contains_node(ip));
        assert!(!next.contains_node(lan_node));

        // The router is still linked to the outermost lan.
        let edge = next.handle(Port::new(router, 0));
        let linked: Vec<Node> = next
            .points(edge)
            .filter_map(|p| p.as_port())
            .map(|p| p.node())
            .filter(|&n| n != router)
            .collect();
        assert_eq!(linked.len(), 1);
        assert_eq!(next.parent(linked[0]), next.parent(router));

        let expected = {
            let mut b = BigraphBuilder::new(net_signature());
            let root = b.add_root();
            let router = b.add_node("router", root).unwrap();
            let edge = b.handle(Port::new(router, 0));
            let outer = b.add_node_with_handles("lan", root, &[edge]).unwrap();
            let inner = b.add_node("lan", outer).unwrap();
            b.add_node("ip", inner).unwrap();
            b.make_bigraph()
        };
        assert!(next.is_equivalent(&expected));
    }

    #[rstest]
    fn duplicate_and_discard(net: Bigraph) {
        let twice =
            RewritingRule::new(lan(1, false), lan(2, false), InstantiationMap::new([0, 0])).unwrap();
        let next = twice.apply(&net).unwrap().next().unwrap().unwrap();
        assert_eq!(next.num_nodes(), 4);
        let ips: Vec<Node> = next
            .nodes()
            .filter(|&n| next.control(n).name() == "ip")
            .collect();
        assert_eq!(ips.len(), 2);
        assert_ne!(next.handle(Port::new(ips[0], 0)), next.handle(Port::new(ips[1], 0)));

        let never =
            RewritingRule::new(lan(1, false), lan(0, false), InstantiationMap::default()).unwrap();
        let next = never.apply(&net).unwrap().next().unwrap().unwrap();
        assert_eq!(next.num_nodes(), 2);
        assert!(next.validate().is_ok());
    }

    #[rstest]
    fn keeps_first_use(net: Bigraph) {
        let ip = net
            .nodes()
            .find(|&n| net.control(n).name() == "ip")
            .unwrap();
        let twice =
            RewritingRule::new(lan(1, false), lan(2, false), InstantiationMap::new([0, 0])).unwrap();
        let next = twice.apply(&net).unwrap().next().unwrap().unwrap();
        let ips: Vec<Node> = next
            .nodes()
            .filter(|&n| next.control(n).name() == "ip")
            .collect();
        assert_eq!(ips.iter().filter(|&&n| n == ip).count(), 1);
    }

    #[test]
    fn distinct_matches_are_kept() {
        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        for _ in 0..2 {
            let lan = b.add_node("lan", root).unwrap();
            b.add_node("ip", lan).unwrap();
        }
        let agent = b.make_bigraph();
        let rule =
            RewritingRule::new(lan(1, false), lan(1, true), InstantiationMap::new([0])).unwrap();
        let successors: Vec<Bigraph> = rule
            .apply(&agent)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(successors.len(), 2);
        assert!(successors[0].is_equivalent(&successors[1]));
        assert_ne!(successors[0], successors[1]);
    }

    #[test]
    fn outer_faces_must_agree() {
        let mut b = BigraphBuilder::from_bigraph(&lan(1, false));
        b.add_root();
        let wider = b.make_bigraph();
        let mut b = BigraphBuilder::from_bigraph(&lan(1, false));
        let x = b.outer_name("x").unwrap();
        b.rename_outer_name(x, "y").unwrap();
        let renamed = b.make_bigraph();
        for reactum in [wider, renamed] {
            assert!(matches!(
                RewritingRule::new(lan(1, false), reactum, InstantiationMap::identity(1)),
                Err(RuleError::InterfaceMismatch { .. })
            ));
        }
    }

    #[rstest]
    #[case::too_short(vec![], RuleError::InstantiationLength { expected: 1, found: 0 })]
    #[case::too_long(vec![0, 0], RuleError::InstantiationLength { expected: 1, found: 2 })]
    #[case::out_of_range(vec![1], RuleError::InstantiationOutOfRange { site: 0, index: 1, width: 1 })]
    fn invalid_instantiation(#[case] map: Vec<usize>, #[case] error: RuleError) {
        assert_eq!(
            RewritingRule::new(lan(1, false), lan(1, true), map.into()).unwrap_err(),
            error
        );
    }

    #[test]
    fn inner_names_must_agree() {
        let mut b = BigraphBuilder::from_bigraph(&lan(1, false));
        b.add_inner_name("y").unwrap();
        let reactum = b.make_bigraph();
        assert!(matches!(
            RewritingRule::new(lan(1, false), reactum, InstantiationMap::new([0])),
            Err(RuleError::InnerNameMismatch { .. })
        ));
    }

    /// `root{lan[x], site}` with an inner name `y`, linked to `x` or closed.
    fn lan_beside_site(linked: bool) -> Bigraph {
        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let x = b.add_outer_name("x").unwrap();
        b.add_node_with_handles("lan", root, &[x.into()]).unwrap();
        b.add_site(root).unwrap();
        if linked {
            b.add_inner_name_with_handle("y", x).unwrap();
        } else {
            b.add_inner_name("y").unwrap();
        }
        b.make_bigraph()
    }

    #[test]
    fn parameters_follow_inner_names_of_outer_names() {
        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let lan = b.add_node("lan", root).unwrap();
        let edge = b.handle(Port::new(lan, 0));
        let ip = b.add_node_with_handles("ip", root, &[edge]).unwrap();
        let agent = b.make_bigraph();

        // The reactum cuts `y` loose from `x`, detaching whatever the
        // parameter linked through it.
        let rule = RewritingRule::new(
            lan_beside_site(true),
            lan_beside_site(false),
            InstantiationMap::identity(1),
        )
        .unwrap();
        let successors: Vec<Bigraph> = rule
            .apply(&agent)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(successors.len(), 2);
        let still_linked: Vec<bool> = successors
            .iter()
            .map(|next| {
                assert!(next.validate().is_ok());
                let lan = next
                    .nodes()
                    .find(|&n| next.control(n).name() == "lan")
                    .unwrap();
                next.handle(Port::new(ip, 0)) == next.handle(Port::new(lan, 0))
            })
            .collect();
        // The ip stays in the context, or moves into the parameter.
        assert_eq!(still_linked, [true, false]);
    }

    #[rstest]
    fn serde_roundtrip(net: Bigraph) {
        let rule =
            RewritingRule::new(lan(1, false), lan(1, true), InstantiationMap::new([0])).unwrap();
        let json = serde_json::to_string(&rule).unwrap();
        let loaded: RewritingRule = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.instantiation(), rule.instantiation());
        assert!(loaded.redex().is_equivalent(rule.redex()));
        assert!(loaded.reactum().is_equivalent(rule.reactum()));
        assert_eq!(loaded.apply(&net).unwrap().count(), 1);
    }
}
