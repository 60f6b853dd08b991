//! Region quadtree over circle bounding squares.
//!
//! Rectangles are pushed down to the single quadrant that fully contains them;
//! anything crossing a split line stays at the node where it straddles. The
//! tree is never updated in place: owners clear and rebuild it.

use crate::types::{Bounds, EntityId};

/// Quadrant order of a node's children.
pub const NE: usize = 0;
pub const NW: usize = 1;
pub const SW: usize = 2;
pub const SE: usize = 3;

/// Rectangle stored in the index, tagged with its owning entity.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRect {
    pub bounds: Bounds,
    pub owner: EntityId,
}

impl IndexedRect {
    pub fn new(bounds: Bounds, owner: EntityId) -> Self {
        Self { bounds, owner }
    }
}

/// A node in the quadtree. Either a leaf or exactly four children.
#[derive(Debug)]
pub struct QuadTreeNode {
    bounds: Bounds,
    level: u32,
    objects: Vec<IndexedRect>,
    /// Child nodes (NE, NW, SW, SE) - None if leaf
    children: Option<Box<[QuadTreeNode; 4]>>,
}

impl QuadTreeNode {
    pub fn new(bounds: Bounds, level: u32) -> Self {
        Self {
            bounds,
            level,
            objects: Vec::new(),
            children: None,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Rectangles stored at this node. On an internal node these are the
    /// ones that straddle a split line.
    pub fn objects(&self) -> &[IndexedRect] {
        &self.objects
    }

    pub fn children(&self) -> Option<&[QuadTreeNode; 4]> {
        self.children.as_deref()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Returns the quadrant that fully contains `rect`, or `None` when it
    /// crosses either split line.
    pub fn get_index(&self, rect: &Bounds) -> Option<usize> {
        let vertical_mid = self.bounds.x + self.bounds.width / 2.0;
        let horizontal_mid = self.bounds.y + self.bounds.height / 2.0;

        let top = rect.y < horizontal_mid && rect.bottom() < horizontal_mid;
        let bottom = rect.y > horizontal_mid;

        if rect.x < vertical_mid && rect.right() < vertical_mid {
            if top {
                return Some(NW);
            }
            if bottom {
                return Some(SW);
            }
        } else if rect.x > vertical_mid {
            if top {
                return Some(NE);
            }
            if bottom {
                return Some(SE);
            }
        }
        None
    }

    fn insert(&mut self, rect: IndexedRect, max_objects: usize, max_levels: u32) {
        if !self.is_leaf() {
            if let Some(index) = self.get_index(&rect.bounds) {
                if let Some(children) = self.children.as_mut() {
                    children[index].insert(rect, max_objects, max_levels);
                }
                return;
            }
        }

        self.objects.push(rect);

        if self.objects.len() > max_objects && self.level < max_levels {
            if self.children.is_none() {
                self.split();
            }
            self.redistribute(max_objects, max_levels);
        }
    }

    /// Pushes every stored rectangle that fits a single quadrant down into it.
    fn redistribute(&mut self, max_objects: usize, max_levels: u32) {
        let stored = std::mem::take(&mut self.objects);
        for rect in stored {
            match self.get_index(&rect.bounds) {
                Some(index) => {
                    if let Some(children) = self.children.as_mut() {
                        children[index].insert(rect, max_objects, max_levels);
                    }
                }
                None => self.objects.push(rect),
            }
        }
    }

    fn split(&mut self) {
        let next_level = self.level + 1;
        let sub_width = (self.bounds.width / 2.0).round();
        let sub_height = (self.bounds.height / 2.0).round();
        let x = self.bounds.x.round();
        let y = self.bounds.y.round();

        self.children = Some(Box::new([
            QuadTreeNode::new(Bounds::new(x + sub_width, y, sub_width, sub_height), next_level),
            QuadTreeNode::new(Bounds::new(x, y, sub_width, sub_height), next_level),
            QuadTreeNode::new(Bounds::new(x, y + sub_height, sub_width, sub_height), next_level),
            QuadTreeNode::new(
                Bounds::new(x + sub_width, y + sub_height, sub_width, sub_height),
                next_level,
            ),
        ]));
    }

    fn retrieve<'a>(&'a self, rect: &Bounds, out: &mut Vec<&'a IndexedRect>) {
        out.extend(self.objects.iter());

        if let Some(children) = &self.children {
            match self.get_index(rect) {
                Some(index) => children[index].retrieve(rect, out),
                None => {
                    for child in children.iter() {
                        child.retrieve(rect, out);
                    }
                }
            }
        }
    }

    fn stats(&self) -> NodeStats {
        let mut stats = NodeStats {
            total_objects: self.objects.len(),
            max_depth: self.level,
            leaf_nodes: 0,
            internal_nodes: 0,
        };

        match &self.children {
            None => stats.leaf_nodes = 1,
            Some(children) => {
                stats.internal_nodes = 1;
                for child in children.iter() {
                    let child_stats = child.stats();
                    stats.total_objects += child_stats.total_objects;
                    stats.max_depth = stats.max_depth.max(child_stats.max_depth);
                    stats.leaf_nodes += child_stats.leaf_nodes;
                    stats.internal_nodes += child_stats.internal_nodes;
                }
            }
        }

        stats
    }
}

/// Structure of a (sub)tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub total_objects: usize,
    pub max_depth: u32,
    pub leaf_nodes: usize,
    pub internal_nodes: usize,
}

/// Cumulative counters for one index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub total_insertions: u64,
    pub total_clears: u64,
}

/// Broad-phase spatial index for one entity population.
///
/// `retrieve` may return rectangles that do not overlap the query; callers
/// apply the exact test. It never misses a rectangle that does overlap.
#[derive(Debug)]
pub struct SpatialIndex {
    root: QuadTreeNode,
    max_objects: usize,
    max_levels: u32,
    len: usize,
    stats: IndexStats,
}

impl SpatialIndex {
    pub fn new(bounds: Bounds, max_objects: usize, max_levels: u32) -> Self {
        Self {
            root: QuadTreeNode::new(bounds, 0),
            max_objects: max_objects.max(1),
            max_levels,
            len: 0,
            stats: IndexStats::default(),
        }
    }

    pub fn insert(&mut self, rect: IndexedRect) {
        self.root.insert(rect, self.max_objects, self.max_levels);
        self.len += 1;
        self.stats.total_insertions += 1;
    }

    /// Candidate rectangles that might overlap `rect`.
    pub fn retrieve(&self, rect: &Bounds) -> Vec<&IndexedRect> {
        let mut out = Vec::new();
        self.root.retrieve(rect, &mut out);
        out
    }

    /// Drops every rectangle and child node, leaving a single empty leaf.
    pub fn clear(&mut self) {
        self.root = QuadTreeNode::new(self.root.bounds, 0);
        self.len = 0;
        self.stats.total_clears += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bounds(&self) -> &Bounds {
        self.root.bounds()
    }

    pub fn root(&self) -> &QuadTreeNode {
        &self.root
    }

    pub fn node_stats(&self) -> NodeStats {
        self.root.stats()
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    fn rect(x: f64, y: f64, w: f64, h: f64, owner: &str) -> IndexedRect {
        IndexedRect::new(Bounds::new(x, y, w, h), EntityId::parse(owner).unwrap())
    }

    fn collect_nodes<'a>(node: &'a QuadTreeNode, out: &mut Vec<&'a QuadTreeNode>) {
        out.push(node);
        if let Some(children) = node.children() {
            for child in children.iter() {
                collect_nodes(child, out);
            }
        }
    }

    #[test]
    fn test_child_index_calculation() {
        let node = QuadTreeNode::new(Bounds::new(0.0, 0.0, 100.0, 100.0), 0);

        assert_eq!(node.get_index(&Bounds::new(60.0, 10.0, 10.0, 10.0)), Some(NE));
        assert_eq!(node.get_index(&Bounds::new(10.0, 10.0, 10.0, 10.0)), Some(NW));
        assert_eq!(node.get_index(&Bounds::new(10.0, 60.0, 10.0, 10.0)), Some(SW));
        assert_eq!(node.get_index(&Bounds::new(60.0, 60.0, 10.0, 10.0)), Some(SE));

        // Crossing either split line keeps it at the node
        assert_eq!(node.get_index(&Bounds::new(45.0, 10.0, 10.0, 10.0)), None);
        assert_eq!(node.get_index(&Bounds::new(10.0, 45.0, 10.0, 10.0)), None);
        // Touching a midpoint counts as crossing
        assert_eq!(node.get_index(&Bounds::new(40.0, 10.0, 10.0, 10.0)), None);
        assert_eq!(node.get_index(&Bounds::new(50.0, 10.0, 10.0, 10.0)), None);
        // A point exactly on the midpoint stays too
        assert_eq!(node.get_index(&Bounds::new(50.0, 50.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_quadtree_subdivision() {
        let mut tree = SpatialIndex::new(Bounds::new(0.0, 0.0, 1000.0, 1000.0), 4, 4);

        for i in 0..20 {
            let x = 10.0 + (i % 5) as f64 * 90.0;
            let y = 10.0 + (i / 5) as f64 * 90.0;
            tree.insert(rect(x, y, 2.0, 2.0, &format!("Object_{i}")));
        }

        let stats = tree.node_stats();
        assert!(stats.max_depth > 0, "Tree should have subdivided");
        assert!(stats.internal_nodes > 0, "Should have internal nodes");
        assert_eq!(stats.total_objects, 20);
        assert_eq!(tree.len(), 20);
    }

    #[test]
    fn test_split_child_bounds_are_rounded() {
        let mut tree = SpatialIndex::new(Bounds::new(0.3, 0.0, 101.0, 51.0), 1, 2);
        tree.insert(rect(1.0, 1.0, 1.0, 1.0, "A_1"));
        tree.insert(rect(90.0, 40.0, 1.0, 1.0, "A_2"));

        let children = tree.root().children().expect("root should have split");
        assert_eq!(*children[NE].bounds(), Bounds::new(51.0, 0.0, 51.0, 26.0));
        assert_eq!(*children[NW].bounds(), Bounds::new(0.0, 0.0, 51.0, 26.0));
        assert_eq!(*children[SW].bounds(), Bounds::new(0.0, 26.0, 51.0, 26.0));
        assert_eq!(*children[SE].bounds(), Bounds::new(51.0, 26.0, 51.0, 26.0));
        assert_eq!(children[NE].level(), 1);
    }

    #[test]
    fn test_straddlers_stay_at_parent() {
        let mut tree = SpatialIndex::new(Bounds::new(0.0, 0.0, 100.0, 100.0), 2, 4);
        tree.insert(rect(10.0, 10.0, 5.0, 5.0, "A_1"));
        tree.insert(rect(70.0, 70.0, 5.0, 5.0, "A_2"));
        tree.insert(rect(45.0, 45.0, 10.0, 10.0, "A_3"));

        let root = tree.root();
        assert!(!root.is_leaf());
        assert_eq!(root.objects().len(), 1);
        assert_eq!(root.objects()[0].owner.as_str(), "A_3");
        let children = root.children().unwrap();
        assert_eq!(children[NW].objects().len(), 1);
        assert_eq!(children[SE].objects().len(), 1);
    }

    #[test]
    fn test_leaf_load_respects_split_threshold() {
        let max_objects = 3;
        let max_levels = 5;
        let mut tree = SpatialIndex::new(Bounds::new(0.0, 0.0, 1024.0, 1024.0), max_objects, max_levels);

        // Small rectangles spread over a grid with no cell on a split line
        for i in 0..200 {
            let x = 3.0 + (i % 20) as f64 * 51.0;
            let y = 3.0 + (i / 20) as f64 * 101.0;
            tree.insert(rect(x, y, 1.0, 1.0, &format!("Object_{i}")));
        }

        let mut nodes = Vec::new();
        collect_nodes(tree.root(), &mut nodes);
        for node in nodes.iter().filter(|n| n.is_leaf()) {
            assert!(
                node.objects().len() <= max_objects || node.level() == max_levels,
                "leaf at level {} holds {} rectangles",
                node.level(),
                node.objects().len()
            );
        }
        assert!(nodes.iter().all(|n| n.level() <= max_levels));
        assert_eq!(tree.node_stats().total_objects, 200);
    }

    #[test]
    fn test_depth_is_capped() {
        let mut tree = SpatialIndex::new(Bounds::new(0.0, 0.0, 1000.0, 1000.0), 1, 2);
        for i in 0..50 {
            let offset = i as f64 * 0.01;
            tree.insert(rect(10.0 + offset, 10.0, 0.0, 0.0, &format!("Object_{i}")));
        }
        assert_eq!(tree.node_stats().max_depth, 2);
        assert_eq!(tree.node_stats().total_objects, 50);
    }

    #[test]
    fn test_retrieve_has_no_false_negatives() {
        let mut tree = SpatialIndex::new(Bounds::new(0.0, 0.0, 1000.0, 1000.0), 4, 6);
        let mut all = Vec::new();
        for i in 0..300u32 {
            // Deterministic scatter with varied sizes
            let x = f64::from((i * 7919) % 1000);
            let y = f64::from((i * 104729) % 1000);
            let r = f64::from(i % 13);
            let indexed = IndexedRect::new(
                Bounds::around(Position::new(x, y), r),
                EntityId::parse(format!("Object_{i}")).unwrap(),
            );
            all.push(indexed.clone());
            tree.insert(indexed);
        }

        let queries = [
            Bounds::around(Position::new(500.0, 500.0), 40.0),
            Bounds::around(Position::new(120.0, 880.0), 15.0),
            Bounds::around(Position::new(999.0, 1.0), 100.0),
            Bounds::around(Position::new(250.0, 250.0), 0.0),
            Bounds::new(0.0, 0.0, 1000.0, 1000.0),
        ];

        for query in &queries {
            let candidates: Vec<&EntityId> = tree.retrieve(query).into_iter().map(|r| &r.owner).collect();
            for stored in all.iter().filter(|r| r.bounds.intersects(query)) {
                assert!(
                    candidates.contains(&&stored.owner),
                    "{} overlaps {:?} but was not retrieved",
                    stored.owner,
                    query
                );
            }
        }
    }

    #[test]
    fn test_retrieve_prunes_other_quadrants() {
        let mut tree = SpatialIndex::new(Bounds::new(0.0, 0.0, 100.0, 100.0), 1, 4);
        tree.insert(rect(10.0, 10.0, 2.0, 2.0, "A_nw"));
        tree.insert(rect(80.0, 80.0, 2.0, 2.0, "A_se"));

        let found = tree.retrieve(&Bounds::new(5.0, 5.0, 10.0, 10.0));
        let owners: Vec<&str> = found.iter().map(|r| r.owner.as_str()).collect();
        assert_eq!(owners, vec!["A_nw"]);
    }

    #[test]
    fn test_clear_resets_to_single_leaf() {
        let mut tree = SpatialIndex::new(Bounds::new(0.0, 0.0, 100.0, 100.0), 1, 4);
        for i in 0..10 {
            tree.insert(rect(f64::from(i) * 9.0 + 1.0, 1.0, 1.0, 1.0, &format!("A_{i}")));
        }
        assert!(!tree.root().is_leaf());

        tree.clear();
        assert!(tree.root().is_leaf());
        assert!(tree.is_empty());
        assert_eq!(*tree.bounds(), Bounds::new(0.0, 0.0, 100.0, 100.0));
        assert!(tree.retrieve(&Bounds::new(0.0, 0.0, 100.0, 100.0)).is_empty());
        assert_eq!(tree.stats().total_clears, 1);
        assert_eq!(tree.stats().total_insertions, 10);
    }
}
