//! Finding the occurrences of a redex inside an agent.
//!
//! An occurrence is witnessed by a decomposition of the agent
//!
//! ```text
//! agent = context ∘ (redex ‖ id_Z) ∘ param
//! ```
//!
//! where `redex` is an image of the pattern inside the agent and `id_Z` routes
//! the links of the parameters that do not go through the redex.
//!
//! The search assigns an agent node to each redex node, outermost first,
//! then places the redex roots that have no nodes, then distributes the agent
//! nodes left around the image between the context and the redex sites.
//! Partial assignments live on an explicit work stack, so matches are produced
//! lazily and the search stops as soon as the caller stops iterating.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use smol_str::SmolStr;
use thiserror::Error;
use tracing::{debug, trace};

use crate::bigraph::graph::Graph;
use crate::bigraph::{Bigraph, BigraphError, BigraphView};
use crate::core::{Edge, Handle, Node, OuterName, Parent, Point, Root, Site};
use crate::ids::IdGenerator;

/// Options of the matcher.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Forbid matches located inside a node with a passive control.
    pub respect_passive: bool,
    /// Stop after this many matches.
    pub max_matches: Option<usize>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            respect_passive: true,
            max_matches: None,
        }
    }
}

/// Scores the candidate images of redex nodes.
///
/// Candidates with a higher weight are explored first. Weights only change the
/// order in which matches are found, never the set of matches.
pub trait CandidateWeight {
    /// The weight of mapping `redex` to `agent`.
    fn weight(&self, redex: Node, agent: Node) -> f64;

    /// Returns `true` if every candidate weighs the same, so candidates need
    /// not be sorted.
    fn is_uniform(&self) -> bool {
        false
    }
}

/// Explores candidates in the order of the agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unweighted;

impl CandidateWeight for Unweighted {
    fn weight(&self, _redex: Node, _agent: Node) -> f64 {
        0.0
    }

    fn is_uniform(&self) -> bool {
        true
    }
}

impl<F: Fn(Node, Node) -> f64> CandidateWeight for F {
    fn weight(&self, redex: Node, agent: Node) -> f64 {
        self(redex, agent)
    }
}

/// Errors raised when starting a match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MatchError {
    /// The agent and the redex are defined over different signatures.
    #[error("Signature mismatch: the agent is over {agent}, the redex over {redex}.")]
    SignatureMismatch {
        /// Identifier of the signature of the agent.
        agent: SmolStr,
        /// Identifier of the signature of the redex.
        redex: SmolStr,
    },
    /// The agent has a non-empty inner face.
    #[error("The agent is not ground.")]
    NotGround,
}

/// Enumerates the matches of a redex inside agents.
#[derive(Clone, Debug, Default)]
pub struct Matcher<W = Unweighted> {
    config: MatcherConfig,
    weight: W,
}

impl Matcher {
    /// A matcher with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// A matcher with the given configuration.
    pub fn with_config(config: MatcherConfig) -> Self {
        Self {
            config,
            weight: Unweighted,
        }
    }
}

impl<W: CandidateWeight> Matcher<W> {
    /// Explores candidates in decreasing order of the given weight.
    pub fn weighted<V: CandidateWeight>(self, weight: V) -> Matcher<V> {
        Matcher {
            config: self.config,
            weight,
        }
    }

    /// The configuration of the matcher.
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Lazily enumerates the matches of `redex` inside `agent`.
    pub fn matches<'a>(
        &'a self,
        agent: &'a Bigraph,
        redex: &'a Bigraph,
    ) -> Result<Matches<'a, W>, MatchError> {
        if agent.signature() != redex.signature() {
            return Err(MatchError::SignatureMismatch {
                agent: agent.signature().id().clone(),
                redex: redex.signature().id().clone(),
            });
        }
        if !agent.is_ground() {
            return Err(MatchError::NotGround);
        }
        debug!(
            agent_nodes = agent.num_nodes(),
            redex_nodes = redex.num_nodes(),
            redex_face = %redex.outer_face(),
            "matching redex"
        );
        let plan = Plan::new(&redex.graph);
        let mut matches = Matches {
            agent: &agent.graph,
            redex: &redex.graph,
            plan,
            config: &self.config,
            weight: &self.weight,
            stack: Vec::new(),
            ids: IdGenerator::new(),
            found: 0,
            explored: 0,
        };
        let start = State::new(redex.roots().len());
        if let Some(start) = matches.settle(start) {
            matches.stack.push(start);
        }
        Ok(matches)
    }
}

/// An occurrence of a redex inside an agent.
///
/// The pieces keep the identities of the agent's entities, so that
/// [`Match::recompose`] gives back the agent itself.
#[derive(Clone, Debug)]
pub struct Match {
    context: Bigraph,
    redex: Bigraph,
    identity: Bigraph,
    params: Vec<Bigraph>,
    param: Bigraph,
    embedding: IndexMap<Node, Node>,
}

impl Match {
    /// The context: the agent with the occurrence cut out.
    ///
    /// Its sites stand for the redex roots and its inner names are the outer
    /// names of the redex followed by those of [`Match::identity`].
    pub fn context(&self) -> &Bigraph {
        &self.context
    }

    /// The image of the redex, with the same interfaces as the redex.
    pub fn redex(&self) -> &Bigraph {
        &self.redex
    }

    /// The identity on the links of the parameters that bypass the redex.
    pub fn identity(&self) -> &Bigraph {
        &self.identity
    }

    /// One ground parameter per redex site.
    ///
    /// Every parameter has the inner names of the redex and those of
    /// [`Match::identity`] as outer names.
    pub fn params(&self) -> &[Bigraph] {
        &self.params
    }

    /// The parallel product of [`Match::params`].
    pub fn param(&self) -> &Bigraph {
        &self.param
    }

    /// The image of each redex node.
    pub fn embedding(&self) -> &IndexMap<Node, Node> {
        &self.embedding
    }

    /// Computes `context ∘ (redex ‖ identity) ∘ param`.
    pub fn recompose(&self) -> Result<Bigraph, BigraphError> {
        let image = self.redex.clone().juxtapose(self.identity.clone())?;
        self.context
            .clone()
            .compose(image)?
            .compose(self.param.clone())
    }
}

/// What the search needs to know about the redex.
#[derive(Debug)]
struct Plan {
    /// Redex nodes, in pre-order.
    order: Vec<Node>,
    /// Roots with no node children.
    unanchored: Vec<usize>,
    /// Site children of each root.
    root_sites: Vec<Vec<Site>>,
    /// Site children of each node.
    node_sites: HashMap<Node, Vec<Site>>,
    /// Number of node children of each node.
    node_children: HashMap<Node, usize>,
    /// The first inner name linked to each edge.
    edge_inner: HashMap<Edge, SmolStr>,
    /// The first inner name linked to each outer name.
    outer_inner: HashMap<OuterName, SmolStr>,
}

impl Plan {
    fn new(redex: &Graph) -> Self {
        let mut order = Vec::with_capacity(redex.nodes.len());
        let mut unanchored = Vec::new();
        let mut root_sites = Vec::with_capacity(redex.roots.len());
        for (i, &root) in redex.roots.keys().enumerate() {
            let parent = Parent::Root(root);
            order.extend_from_slice(redex.ancestry().descendants(parent));
            let children = redex.children_of(parent);
            if children.iter().all(|c| c.as_node().is_none()) {
                unanchored.push(i);
            }
            root_sites.push(children.iter().filter_map(|c| c.as_site()).collect());
        }
        let mut node_sites = HashMap::new();
        let mut node_children = HashMap::new();
        for (&n, data) in &redex.nodes {
            let sites: Vec<Site> = data.children.iter().filter_map(|c| c.as_site()).collect();
            node_children.insert(n, data.children.len() - sites.len());
            node_sites.insert(n, sites);
        }
        let mut edge_inner = HashMap::new();
        let mut outer_inner = HashMap::new();
        for data in redex.inner_names.values() {
            match data.handle {
                Handle::Edge(e) => edge_inner.entry(e).or_insert_with(|| data.name.clone()),
                Handle::OuterName(o) => outer_inner.entry(o).or_insert_with(|| data.name.clone()),
            };
        }
        Self {
            order,
            unanchored,
            root_sites,
            node_sites,
            node_children,
            edge_inner,
            outer_inner,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Choosing the image of the `i`-th redex node.
    Nodes(usize),
    /// Choosing the location of the `i`-th root without nodes.
    Anchors(usize),
    /// Choosing where the `i`-th free agent node goes.
    Distribute(usize),
    Done,
}

/// A partial match.
#[derive(Clone, Debug)]
struct State {
    phase: Phase,
    /// Redex node to agent node.
    nodes: IndexMap<Node, Node>,
    /// Agent node to redex node.
    images: HashMap<Node, Node>,
    /// Location of each redex root in the agent.
    anchors: Vec<Option<Parent>>,
    /// Redex handle to agent handle.
    links: HashMap<Handle, Handle>,
    /// Agent edges that are images of redex edges.
    edge_images: HashMap<Edge, Edge>,
    /// Agent handles that are images of redex outer names.
    name_images: HashSet<Handle>,
    /// Free agent nodes still to distribute, with the sites they may go to.
    /// `None` stands for the context.
    pending: Vec<(Node, Vec<Option<Site>>)>,
    /// Agent nodes heading a parameter, with their redex site.
    assigned: IndexMap<Node, Site>,
}

impl State {
    fn new(width: usize) -> Self {
        Self {
            phase: Phase::Nodes(0),
            nodes: IndexMap::new(),
            images: HashMap::new(),
            anchors: vec![None; width],
            links: HashMap::new(),
            edge_images: HashMap::new(),
            name_images: HashSet::new(),
            pending: Vec::new(),
            assigned: IndexMap::new(),
        }
    }

    /// Records that the redex handle `rh` is sent to the agent handle `ah`.
    fn link(&mut self, redex: &Graph, agent: &Graph, rh: Handle, ah: Handle) -> bool {
        if let Some(&prev) = self.links.get(&rh) {
            return prev == ah;
        }
        match rh {
            Handle::Edge(re) => {
                let Handle::Edge(ae) = ah else {
                    return false;
                };
                if self.edge_images.contains_key(&ae) || self.name_images.contains(&ah) {
                    return false;
                }
                let ports = redex
                    .points_of(rh)
                    .iter()
                    .filter(|p| p.as_port().is_some())
                    .count();
                let total = agent.points_of(ah).len();
                let routed = redex.points_of(rh).len() > ports;
                if total < ports || (!routed && total != ports) {
                    return false;
                }
                self.edge_images.insert(ae, re);
            }
            Handle::OuterName(_) => {
                if ah.as_edge().is_some_and(|ae| self.edge_images.contains_key(&ae)) {
                    return false;
                }
                self.name_images.insert(ah);
            }
        }
        self.links.insert(rh, ah);
        true
    }
}

/// The lazy sequence of matches returned by [`Matcher::matches`].
pub struct Matches<'a, W = Unweighted> {
    agent: &'a Graph,
    redex: &'a Graph,
    plan: Plan,
    config: &'a MatcherConfig,
    weight: &'a W,
    stack: Vec<State>,
    ids: IdGenerator,
    found: usize,
    explored: usize,
}

impl<W: CandidateWeight> Iterator for Matches<'_, W> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        if self.config.max_matches.is_some_and(|max| self.found >= max) {
            self.stack.clear();
        }
        while let Some(state) = self.stack.pop() {
            self.explored += 1;
            match state.phase {
                Phase::Nodes(i) => self.expand_node(state, i),
                Phase::Anchors(i) => self.expand_anchor(state, i),
                Phase::Distribute(i) => self.expand_distribution(state, i),
                Phase::Done => {
                    if let Some(m) = self.finish(state) {
                        self.found += 1;
                        trace!(found = self.found, "match found");
                        return Some(m);
                    }
                }
            }
        }
        debug!(
            found = self.found,
            explored = self.explored,
            "match search exhausted"
        );
        None
    }
}

impl<W: CandidateWeight> Matches<'_, W> {
    /// Moves a state past the phases it has completed.
    fn settle(&self, mut state: State) -> Option<State> {
        loop {
            match state.phase {
                Phase::Nodes(i) if i >= self.plan.order.len() => state.phase = Phase::Anchors(0),
                Phase::Anchors(i) if i >= self.plan.unanchored.len() => {
                    self.collect_free_nodes(&mut state)?;
                    state.phase = Phase::Distribute(0);
                }
                Phase::Distribute(i) if i >= state.pending.len() => state.phase = Phase::Done,
                _ => return Some(state),
            }
        }
    }

    /// Pushes the successors of a state, the first one ending on top.
    fn push_all(&mut self, successors: Vec<State>) {
        let settled: Vec<State> = successors
            .into_iter()
            .filter_map(|s| self.settle(s))
            .collect();
        self.stack.extend(settled.into_iter().rev());
    }

    /// Returns `true` if the redex may sit directly under `place`.
    fn reactive(&self, place: Parent) -> bool {
        if !self.config.respect_passive {
            return true;
        }
        match place {
            Parent::Root(_) => true,
            Parent::Node(n) => {
                let active = |n: Node| self.agent.node(n).control.is_active();
                active(n)
                    && self
                        .agent
                        .ancestry()
                        .ancestors(n)
                        .iter()
                        .filter_map(|p| p.as_node())
                        .all(active)
            }
        }
    }

    /// Returns `true` if `place` lies outside the image and its parameters.
    fn in_context(&self, state: &State, place: Parent) -> bool {
        match place {
            Parent::Root(_) => true,
            Parent::Node(n) => {
                !state.images.contains_key(&n)
                    && self
                        .agent
                        .ancestry()
                        .ancestors(n)
                        .iter()
                        .filter_map(|p| p.as_node())
                        .all(|a| !state.images.contains_key(&a))
            }
        }
    }

    /// Agent nodes may only image closed redex nodes with the same number of
    /// children, or at least as many when the redex node has sites.
    fn fits(&self, v: Node, w: Node) -> bool {
        let (rv, aw) = (self.redex.node(v), self.agent.node(w));
        if rv.control != aw.control {
            return false;
        }
        let needed = self.plan.node_children[&v];
        if self.plan.node_sites[&v].is_empty() {
            aw.children.len() == needed
        } else {
            aw.children.len() >= needed
        }
    }

    fn expand_node(&mut self, state: State, i: usize) {
        let v = self.plan.order[i];
        let redex_parent = self.redex.node(v).parent;
        let (pool, root): (Vec<Node>, Option<usize>) = match redex_parent {
            Parent::Node(u) => {
                let w = state.nodes[&u];
                (child_nodes(self.agent, Parent::Node(w)).collect(), None)
            }
            Parent::Root(r) => {
                let index = self.redex.roots.get_index_of(&r).unwrap_or_default();
                match state.anchors[index] {
                    Some(anchor) => (child_nodes(self.agent, anchor).collect(), None),
                    None => (self.agent.nodes.keys().copied().collect(), Some(index)),
                }
            }
        };
        let mut candidates: Vec<Node> = pool
            .into_iter()
            .filter(|w| !state.images.contains_key(w) && self.fits(v, *w))
            .collect();
        if !self.weight.is_uniform() {
            let weights: HashMap<Node, f64> = candidates
                .iter()
                .map(|&w| (w, self.weight.weight(v, w)))
                .collect();
            candidates.sort_by(|a, b| weights[b].total_cmp(&weights[a]));
        }

        let mut successors = Vec::with_capacity(candidates.len());
        'candidates: for w in candidates {
            let mut next = state.clone();
            if let Some(index) = root {
                let anchor = self.agent.node(w).parent;
                if !self.reactive(anchor) || !self.in_context(&next, anchor) {
                    continue;
                }
                next.anchors[index] = Some(anchor);
            }
            let ports = self.redex.node(v).ports.iter();
            for (&rh, &ah) in ports.zip(&self.agent.node(w).ports) {
                if !next.link(self.redex, self.agent, rh, ah) {
                    continue 'candidates;
                }
            }
            next.nodes.insert(v, w);
            next.images.insert(w, v);
            next.phase = Phase::Nodes(i + 1);
            successors.push(next);
        }
        self.push_all(successors);
    }

    fn expand_anchor(&mut self, state: State, i: usize) {
        let index = self.plan.unanchored[i];
        let places = self
            .agent
            .roots
            .keys()
            .map(|&r| Parent::Root(r))
            .chain(self.agent.nodes.keys().map(|&n| Parent::Node(n)));
        let successors = places
            .filter(|&p| self.reactive(p) && self.in_context(&state, p))
            .map(|p| {
                let mut next = state.clone();
                next.anchors[index] = Some(p);
                next.phase = Phase::Anchors(i + 1);
                next
            })
            .collect();
        self.push_all(successors);
    }

    fn expand_distribution(&mut self, state: State, i: usize) {
        let (node, options) = state.pending[i].clone();
        let successors = options
            .into_iter()
            .map(|site| {
                let mut next = state.clone();
                if let Some(site) = site {
                    next.assigned.insert(node, site);
                }
                next.phase = Phase::Distribute(i + 1);
                next
            })
            .collect();
        self.push_all(successors);
    }

    /// Finds the agent nodes around the image that are not images themselves.
    ///
    /// Children of image nodes must go to the sites of their redex node;
    /// children of the locations of redex roots may also stay in the context.
    /// Fails if some child has nowhere to go or a location is not in the context.
    fn collect_free_nodes(&self, state: &mut State) -> Option<()> {
        for &v in &self.plan.order {
            let w = state.nodes[&v];
            let sites = &self.plan.node_sites[&v];
            for c in child_nodes(self.agent, Parent::Node(w)) {
                if state.images.contains_key(&c) {
                    continue;
                }
                match sites.as_slice() {
                    [] => return None,
                    [site] => {
                        state.assigned.insert(c, *site);
                    }
                    _ => state
                        .pending
                        .push((c, sites.iter().copied().map(Some).collect())),
                }
            }
        }

        let anchors: Vec<Parent> = state.anchors.iter().flatten().copied().unique().collect();
        if anchors.iter().any(|&a| !self.in_context(state, a)) {
            return None;
        }
        for &anchor in &anchors {
            let sites: Vec<Site> = state
                .anchors
                .iter()
                .enumerate()
                .filter(|(_, a)| **a == Some(anchor))
                .flat_map(|(r, _)| self.plan.root_sites[r].iter().copied())
                .collect();
            if sites.is_empty() {
                continue;
            }
            for c in child_nodes(self.agent, anchor) {
                if state.images.contains_key(&c) || self.holds_anchor(c, &anchors) {
                    continue;
                }
                let options = std::iter::once(None)
                    .chain(sites.iter().copied().map(Some))
                    .collect();
                state.pending.push((c, options));
            }
        }
        Some(())
    }

    /// Returns `true` if `node` is, or contains, one of the anchors.
    fn holds_anchor(&self, node: Node, anchors: &[Parent]) -> bool {
        anchors.iter().any(|&a| match a {
            Parent::Root(_) => false,
            Parent::Node(n) => {
                n == node || self.agent.ancestry().is_ancestor(Parent::Node(node), n)
            }
        })
    }

    /// Checks the links of a complete assignment and builds its decomposition.
    fn finish(&mut self, state: State) -> Option<Match> {
        let mut param_of: HashMap<Node, usize> = HashMap::new();
        for (&head, site) in &state.assigned {
            let index = self.redex.sites.get_index_of(site)?;
            param_of.insert(head, index);
            for &d in self.agent.ancestry().descendants(Parent::Node(head)) {
                param_of.insert(d, index);
            }
        }

        // The image of a redex edge is closed: its other points must be
        // parameter ports routed through an inner name of that edge.
        for (&ae, &re) in &state.edge_images {
            for &point in self.agent.points_of(Handle::Edge(ae)) {
                let Point::Port(port) = point else {
                    return None;
                };
                let ok = match state.images.get(&port.node()) {
                    Some(&v) => self.redex.node(v).ports[port.index()] == Handle::Edge(re),
                    None => {
                        param_of.contains_key(&port.node()) && self.plan.edge_inner.contains_key(&re)
                    }
                };
                if !ok {
                    return None;
                }
            }
        }

        let pieces = Decomposition::new(self.agent, self.redex, &self.plan, &state, param_of);
        Some(pieces.build(&mut self.ids))
    }
}

fn child_nodes(graph: &Graph, parent: Parent) -> impl Iterator<Item = Node> + '_ {
    graph.children_of(parent).iter().filter_map(|c| c.as_node())
}

/// How an agent handle reached from a parameter is seen by the parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ParamLink {
    /// An edge inside a single parameter.
    Internal,
    /// Through the redex inner name with this name, linked to an edge or to
    /// an outer name of the redex.
    Redex(SmolStr),
    /// Through the identity, under this name.
    Bypass(SmolStr),
}

/// The pieces of a match, computed from a complete assignment.
struct Decomposition<'a> {
    agent: &'a Graph,
    redex: &'a Graph,
    state: &'a State,
    /// Redex site index of each agent node inside a parameter.
    param_of: HashMap<Node, usize>,
    /// Agent handles reached from parameters.
    param_links: IndexMap<Handle, ParamLink>,
    plan: &'a Plan,
}

impl<'a> Decomposition<'a> {
    fn new(
        agent: &'a Graph,
        redex: &'a Graph,
        plan: &'a Plan,
        state: &'a State,
        param_of: HashMap<Node, usize>,
    ) -> Self {
        Self {
            agent,
            redex,
            state,
            param_of,
            param_links: IndexMap::new(),
            plan,
        }
    }

    fn build(mut self, ids: &mut IdGenerator) -> Match {
        self.classify_param_links(ids);
        let context = self.context(ids);
        let redex = self.redex_image(ids);
        let identity = self.identity(ids);
        let width = self.redex.sites.len();
        let params: Vec<Graph> = (0..width).map(|j| self.param(&[j], ids)).collect();
        let all: Vec<usize> = (0..width).collect();
        let param = self.param(&all, ids);
        Match {
            context: Bigraph { graph: context },
            redex: Bigraph { graph: redex },
            identity: Bigraph { graph: identity },
            params: params.into_iter().map(|graph| Bigraph { graph }).collect(),
            param: Bigraph { graph: param },
            embedding: self.state.nodes.clone(),
        }
    }

    fn classify_param_links(&mut self, ids: &mut IdGenerator) {
        let mut taken: HashSet<SmolStr> = self.redex.outer_name_set().into_iter().collect();
        taken.extend(self.redex.inner_name_set());
        // Images of redex outer names that carry an inner name.
        let mut through_names: HashMap<Handle, &SmolStr> = HashMap::new();
        for o in self.redex.outer_names.keys() {
            let inner = self.plan.outer_inner.get(o);
            let image = self.state.links.get(&Handle::OuterName(*o));
            if let (Some(inner), Some(&image)) = (inner, image) {
                through_names.entry(image).or_insert(inner);
            }
        }
        let mut nodes: Vec<Node> = self.param_of.keys().copied().collect();
        nodes.sort_by_key(|n| self.agent.nodes.get_index_of(n));
        for n in nodes {
            for &h in &self.agent.node(n).ports {
                if self.param_links.contains_key(&h) {
                    continue;
                }
                let link = if let Some(re) = h.as_edge().and_then(|e| self.state.edge_images.get(&e)) {
                    ParamLink::Redex(self.plan.edge_inner[re].clone())
                } else if let Some(&name) = through_names.get(&h) {
                    ParamLink::Redex(name.clone())
                } else if self.is_internal(h) {
                    ParamLink::Internal
                } else {
                    let name = loop {
                        let name = ids.fresh_name("z");
                        if taken.insert(name.clone()) {
                            break name;
                        }
                    };
                    ParamLink::Bypass(name)
                };
                self.param_links.insert(h, link);
            }
        }
    }

    /// An edge whose points all lie in the same parameter.
    fn is_internal(&self, handle: Handle) -> bool {
        if !handle.is_edge() {
            return false;
        }
        let mut params = self.agent.points_of(handle).iter().map(|p| {
            p.as_port()
                .and_then(|port| self.param_of.get(&port.node()).copied())
        });
        match params.next() {
            Some(Some(first)) => params.all(|p| p == Some(first)),
            _ => false,
        }
    }

    fn bypass_names(&self) -> impl Iterator<Item = (Handle, &SmolStr)> + '_ {
        self.param_links.iter().filter_map(|(&h, link)| match link {
            ParamLink::Bypass(name) => Some((h, name)),
            _ => None,
        })
    }

    fn is_context_node(&self, n: Node) -> bool {
        !self.state.images.contains_key(&n) && !self.param_of.contains_key(&n)
    }

    fn context(&self, ids: &mut IdGenerator) -> Graph {
        let agent = self.agent;
        let mut g = Graph::new(agent.signature.clone(), ids.owner());
        for &root in agent.roots.keys() {
            g.insert_root(root);
        }
        for (&o, data) in &agent.outer_names {
            g.insert_outer_name(o, data.name.clone());
        }
        for &e in agent.edges.keys() {
            let h = Handle::Edge(e);
            let redex_edge = self.state.edge_images.contains_key(&e);
            let internal = self.param_links.get(&h) == Some(&ParamLink::Internal);
            if !redex_edge && !internal {
                g.insert_edge(e);
            }
        }
        for &root in agent.roots.keys() {
            for &n in agent.ancestry().descendants(Parent::Root(root)) {
                if self.is_context_node(n) {
                    let data = agent.node(n);
                    g.insert_node(n, data.control.clone(), data.parent, data.ports.clone());
                }
            }
        }
        for anchor in &self.state.anchors {
            if let Some(anchor) = *anchor {
                g.insert_site(ids.site(), anchor, None);
            }
        }
        for (&o, data) in &self.redex.outer_names {
            let handle = match self.state.links.get(&Handle::OuterName(o)) {
                Some(&h) => h,
                None => {
                    let e = ids.edge();
                    g.insert_edge(e);
                    e.into()
                }
            };
            g.insert_inner_name(ids.inner_name(), data.name.clone(), handle);
        }
        for (h, name) in self.bypass_names() {
            g.insert_inner_name(ids.inner_name(), name.clone(), h);
        }
        g.prune_idle_edges();
        g
    }

    fn redex_image(&self, ids: &mut IdGenerator) -> Graph {
        let redex = self.redex;
        let mut g = Graph::new(redex.signature.clone(), ids.owner());
        let roots: HashMap<Root, Root> = redex.roots.keys().map(|&r| (r, ids.root())).collect();
        for &r in redex.roots.keys() {
            g.insert_root(roots[&r]);
        }
        let mut handles: HashMap<Handle, Handle> = HashMap::new();
        for &e in redex.edges.keys() {
            let image = match self.state.links.get(&Handle::Edge(e)) {
                Some(&h) => h,
                None => ids.edge().into(),
            };
            if let Handle::Edge(ie) = image {
                g.insert_edge(ie);
            }
            handles.insert(e.into(), image);
        }
        for (&o, data) in &redex.outer_names {
            let image: OuterName = ids.outer_name();
            g.insert_outer_name(image, data.name.clone());
            handles.insert(o.into(), image.into());
        }
        let parent = |p: Parent| match p {
            Parent::Root(r) => Parent::Root(roots[&r]),
            Parent::Node(n) => Parent::Node(self.state.nodes[&n]),
        };
        for &v in &self.plan.order {
            let data = redex.node(v);
            let ports = data.ports.iter().map(|h| handles[h]).collect();
            g.insert_node(self.state.nodes[&v], data.control.clone(), parent(data.parent), ports);
        }
        for data in redex.sites.values() {
            g.insert_site(ids.site(), parent(data.parent), None);
        }
        for data in redex.inner_names.values() {
            g.insert_inner_name(ids.inner_name(), data.name.clone(), handles[&data.handle]);
        }
        g
    }

    fn identity(&self, ids: &mut IdGenerator) -> Graph {
        let mut g = Graph::new(self.agent.signature.clone(), ids.owner());
        for (_, name) in self.bypass_names() {
            let outer = ids.outer_name();
            g.insert_outer_name(outer, name.clone());
            g.insert_inner_name(ids.inner_name(), name.clone(), outer.into());
        }
        g
    }

    /// The parallel product of the parameters of the given redex sites.
    fn param(&self, sites: &[usize], ids: &mut IdGenerator) -> Graph {
        let agent = self.agent;
        let mut g = Graph::new(agent.signature.clone(), ids.owner());
        let mut names: HashMap<SmolStr, OuterName> = HashMap::new();
        for data in self.redex.inner_names.values() {
            let o = ids.outer_name();
            g.insert_outer_name(o, data.name.clone());
            names.insert(data.name.clone(), o);
        }
        for (_, name) in self.bypass_names() {
            let o = ids.outer_name();
            g.insert_outer_name(o, name.clone());
            names.insert(name.clone(), o);
        }
        let mut roots: HashMap<usize, Root> = HashMap::new();
        for &j in sites {
            let root = ids.root();
            g.insert_root(root);
            roots.insert(j, root);
        }
        let inside = |n: &Node| {
            self.param_of
                .get(n)
                .is_some_and(|j| roots.contains_key(j))
        };
        let mut edges: IndexSet<Edge> = IndexSet::new();
        let mut members: Vec<Node> = Vec::new();
        for &root in agent.roots.keys() {
            for &n in agent.ancestry().descendants(Parent::Root(root)) {
                if inside(&n) {
                    members.push(n);
                    for &h in &agent.node(n).ports {
                        if let (Handle::Edge(e), Some(ParamLink::Internal)) =
                            (h, self.param_links.get(&h))
                        {
                            edges.insert(e);
                        }
                    }
                }
            }
        }
        for &e in &edges {
            g.insert_edge(e);
        }
        for n in members {
            let data = agent.node(n);
            let parent = match self.state.assigned.get(&n) {
                Some(site) => {
                    let j = self.redex.sites.get_index_of(site).unwrap_or_default();
                    Parent::Root(roots[&j])
                }
                None => data.parent,
            };
            let ports = data
                .ports
                .iter()
                .map(|h| match &self.param_links[h] {
                    ParamLink::Internal => *h,
                    ParamLink::Redex(name) | ParamLink::Bypass(name) => names[name].into(),
                })
                .collect();
            g.insert_node(n, data.control.clone(), parent, ports);
        }
        g
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rstest::rstest;

    use super::*;
    use crate::bigraph::test::{net, net_signature, network};
    use crate::bigraph::{BigraphBuilder, Interface, Replicable};
    use crate::core::Port;
    use crate::signature::SignatureBuilder;

    /// `root{lan[x]{site}}`.
    fn lan_redex() -> Bigraph {
        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let x = b.add_outer_name("x").unwrap();
        let lan = b.add_node_with_handles("lan", root, &[x.into()]).unwrap();
        b.add_site(lan).unwrap();
        b.make_bigraph()
    }

    fn assert_decomposes(agent: &Bigraph, m: &Match) {
        let whole = m.recompose().unwrap();
        assert!(whole.is_equivalent(agent));
        let mut nodes: Vec<Node> = whole.nodes().collect();
        let mut expected: Vec<Node> = agent.nodes().collect();
        nodes.sort();
        expected.sort();
        assert_eq!(nodes, expected);
    }

    #[test]
    fn lan_matches_once() {
        let (agent, [_, lan, ip]) = network();
        let redex = lan_redex();
        let matches: Vec<Match> = Matcher::new().matches(&agent, &redex).unwrap().collect();
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.embedding().values().copied().collect::<Vec<_>>(), [lan]);
        assert_eq!(m.params().len(), 1);
        assert_eq!(m.params()[0].nodes().collect::<Vec<_>>(), [ip]);
        assert_eq!(m.context().num_nodes(), 1);
        assert_eq!(m.context().inner_face(), Interface::new(1, ["x"]));
        assert!(m.identity().is_empty());
        assert_decomposes(&agent, m);
    }

    #[rstest]
    fn ground_copy_matches_once(net: Bigraph) {
        let redex = net.replicate();
        let matches: Vec<Match> = Matcher::new().matches(&net, &redex).unwrap().collect();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].params().is_empty());
        assert_eq!(matches[0].context().num_nodes(), 0);
        assert_decomposes(&net, &matches[0]);
    }

    #[rstest]
    fn closed_nodes_need_all_children(net: Bigraph) {
        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let x = b.add_outer_name("x").unwrap();
        b.add_node_with_handles("lan", root, &[x.into()]).unwrap();
        let redex = b.make_bigraph();
        assert_eq!(Matcher::new().matches(&net, &redex).unwrap().count(), 0);
    }

    #[rstest]
    #[case::closed(false, 0)]
    #[case::open(true, 2)]
    fn closed_edges_must_be_exact(net: Bigraph, #[case] open: bool, #[case] expected: usize) {
        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let router = b.add_node("router", root).unwrap();
        b.add_site(root).unwrap();
        if open {
            let x = b.add_outer_name("x").unwrap();
            b.relink(Port::new(router, 0), x).unwrap();
        }
        let redex = b.make_bigraph();
        let matches: Vec<Match> = Matcher::new().matches(&net, &redex).unwrap().collect();
        assert_eq!(matches.len(), expected);
        for m in &matches {
            assert_decomposes(&net, m);
        }
    }

    #[rstest]
    #[case::respected(true, 0)]
    #[case::ignored(false, 1)]
    fn passive_controls(#[case] respect_passive: bool, #[case] expected: usize) {
        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let ip = b.add_node("ip", root).unwrap();
        b.add_node("lan", ip).unwrap();
        let agent = b.make_bigraph();
        let config = MatcherConfig {
            respect_passive,
            ..Default::default()
        };
        let matcher = Matcher::with_config(config);
        let redex = lan_redex();
        assert_eq!(matcher.matches(&agent, &redex).unwrap().count(), expected);
    }

    #[rstest]
    fn root_sites_take_siblings(net: Bigraph) {
        let mut b = BigraphBuilder::from_bigraph(&lan_redex());
        let root = b.roots().next().unwrap();
        b.add_site(root).unwrap();
        let redex = b.make_bigraph();
        let matches: Vec<Match> = Matcher::new().matches(&net, &redex).unwrap().collect();
        assert_eq!(matches.len(), 2);
        let routed: Vec<usize> = matches.iter().map(|m| m.params()[1].num_nodes()).collect();
        assert_eq!(routed, [0, 1]);
        // The router shares a link with the lan, which the parameter reaches
        // through the identity.
        assert_eq!(matches[1].identity().outer_face().names.len(), 1);
        for m in &matches {
            assert_decomposes(&net, m);
        }
    }

    #[test]
    fn inner_names_on_outer_names_route_parameters() {
        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let lan = b.add_node("lan", root).unwrap();
        let edge = b.handle(Port::new(lan, 0));
        let ip = b.add_node_with_handles("ip", root, &[edge]).unwrap();
        let agent = b.make_bigraph();

        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let x = b.add_outer_name("x").unwrap();
        b.add_node_with_handles("lan", root, &[x.into()]).unwrap();
        b.add_site(root).unwrap();
        b.add_inner_name_with_handle("y", x).unwrap();
        let redex = b.make_bigraph();

        let matches: Vec<Match> = Matcher::new().matches(&agent, &redex).unwrap().collect();
        assert_eq!(matches.len(), 2);
        let m = matches
            .iter()
            .find(|m| m.params()[0].contains_node(ip))
            .unwrap();
        // The ip reaches the lan through `y`, not around the redex.
        assert!(m.identity().is_empty());
        assert_eq!(m.param().outer_face(), Interface::new(1, ["y"]));
        let y = m.params()[0].outer_name("y").unwrap();
        assert_eq!(m.params()[0].handle(Port::new(ip, 0)), y.into());
        for m in &matches {
            assert_decomposes(&agent, m);
        }
    }

    #[rstest]
    fn empty_roots_anchor_anywhere(net: Bigraph) {
        let redex = Bigraph::identity(net_signature(), 1, std::iter::empty::<&str>()).unwrap();
        let matches: Vec<Match> = Matcher::new().matches(&net, &redex).unwrap().collect();
        // Under the root, each of its two children may be taken or not; the
        // router is empty; the ip may be taken from the lan. The ip is passive.
        assert_eq!(matches.len(), 7);
        for m in &matches {
            assert_decomposes(&net, m);
        }

        let config = MatcherConfig {
            max_matches: Some(3),
            ..Default::default()
        };
        let matcher = Matcher::with_config(config);
        assert_eq!(matcher.matches(&net, &redex).unwrap().count(), 3);
    }

    #[test]
    fn weights_order_candidates() {
        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let first = b.add_node("lan", root).unwrap();
        let second = b.add_node("lan", root).unwrap();
        let agent = b.make_bigraph();

        let mut b = BigraphBuilder::new(net_signature());
        let root = b.add_root();
        let x = b.add_outer_name("x").unwrap();
        b.add_node_with_handles("lan", root, &[x.into()]).unwrap();
        b.add_site(root).unwrap();
        let redex = b.make_bigraph();

        let images = |m: Match| m.embedding()[0];
        let plain: Vec<Node> = Matcher::new()
            .matches(&agent, &redex)
            .unwrap()
            .map(images)
            .unique()
            .collect();
        assert_eq!(plain, [first, second]);

        let prefer_second = move |_: Node, w: Node| if w == second { 1.0 } else { 0.0 };
        let matcher = Matcher::new().weighted(prefer_second);
        let weighted: Vec<Node> = matcher
            .matches(&agent, &redex)
            .unwrap()
            .map(images)
            .unique()
            .collect();
        assert_eq!(weighted, [second, first]);
    }

    #[rstest]
    fn start_errors(net: Bigraph) {
        let other = Arc::new(SignatureBuilder::new().make_signature(Some("other")));
        let redex = Bigraph::empty(other);
        assert!(matches!(
            Matcher::new().matches(&net, &redex),
            Err(MatchError::SignatureMismatch { .. })
        ));

        let open = Bigraph::identity(net_signature(), 1, ["x"]).unwrap();
        assert!(matches!(
            Matcher::new().matches(&open, &net),
            Err(MatchError::NotGround)
        ));
    }

    #[rstest]
    fn empty_redex_matches_everything_once(net: Bigraph) {
        let redex = Bigraph::empty(net_signature());
        let matches: Vec<Match> = Matcher::new().matches(&net, &redex).unwrap().collect();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].context().is_equivalent(&net));
        assert!(matches[0].redex().is_empty());
        assert_decomposes(&net, &matches[0]);
    }
}
