//! Direction-aware grid pathfinding
//!
//! Four interchangeable strategies share 4-neighbour expansion, the
//! [`can_move`] legality filter and path reconstruction. Every search runs on
//! a fresh [`SearchState`] and only reads the grid.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;

use super::grid::GridWorld;
use super::movement::can_move;
use super::types::{Cell, Direction};

/// Order in which neighbours are generated
const NEIGHBOR_ORDER: [Direction; 4] = [
    Direction::North,
    Direction::West,
    Direction::East,
    Direction::South,
];

/// Which search algorithm to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum SearchStrategy {
    /// Uninformed, explicit stack, not optimal
    DepthFirst,
    /// Uninformed, FIFO queue, fewest edges
    BreadthFirst,
    /// g + manhattan, fewest edges
    AStar,
    /// manhattan only, fast but not optimal
    GreedyBestFirst,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 4] = [
        SearchStrategy::BreadthFirst,
        SearchStrategy::DepthFirst,
        SearchStrategy::AStar,
        SearchStrategy::GreedyBestFirst,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SearchStrategy::DepthFirst => "DFS",
            SearchStrategy::BreadthFirst => "BFS",
            SearchStrategy::AStar => "A*",
            SearchStrategy::GreedyBestFirst => "Greedy",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Found,
    /// No legal route, or an endpoint is not drivable
    Unreachable,
    /// The expansion budget ran out before the goal was reached
    Aborted,
}

/// Result of one search plus how much work it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Start to goal inclusive, empty unless `status` is `Found`
    pub path: Vec<Cell>,
    /// Nodes taken off the frontier and expanded
    pub expanded: usize,
    pub status: SearchStatus,
}

impl SearchOutcome {
    fn empty(status: SearchStatus, expanded: usize) -> Self {
        Self {
            path: Vec::new(),
            expanded,
            status,
        }
    }

    /// Number of moves along the path
    pub fn path_cost(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Per-query bookkeeping. Lives only for one call.
struct SearchState<'a> {
    grid: &'a GridWorld,
    start: Cell,
    goal: Cell,
    parent: HashMap<Cell, Cell>,
    closed: HashSet<Cell>,
    g_score: HashMap<Cell, u32>,
    expanded: usize,
    limit: Option<usize>,
}

impl<'a> SearchState<'a> {
    fn new(grid: &'a GridWorld, start: Cell, goal: Cell, limit: Option<usize>) -> Self {
        Self {
            grid,
            start,
            goal,
            parent: HashMap::new(),
            closed: HashSet::new(),
            g_score: HashMap::new(),
            expanded: 0,
            limit,
        }
    }

    /// Count one expansion. Returns false once the budget is spent.
    fn expand(&mut self) -> bool {
        if self.limit.is_some_and(|limit| self.expanded >= limit) {
            return false;
        }
        self.expanded += 1;
        true
    }

    /// Neighbours reachable from `cell` in one legal step
    fn successors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        NEIGHBOR_ORDER
            .iter()
            .map(move |direction| cell.step(*direction))
            .filter(move |next| self.grid.in_bounds(*next) && can_move(self.grid, cell, *next))
    }

    fn found(&self) -> SearchOutcome {
        let mut path = vec![self.goal];
        let mut node = self.goal;
        while node != self.start {
            match self.parent.get(&node) {
                Some(previous) => {
                    node = *previous;
                    path.push(node);
                }
                None => return SearchOutcome::empty(SearchStatus::Unreachable, self.expanded),
            }
        }
        path.reverse();
        SearchOutcome {
            path,
            expanded: self.expanded,
            status: SearchStatus::Found,
        }
    }

    fn aborted(&self) -> SearchOutcome {
        SearchOutcome::empty(SearchStatus::Aborted, self.expanded)
    }

    fn unreachable(&self) -> SearchOutcome {
        SearchOutcome::empty(SearchStatus::Unreachable, self.expanded)
    }

    fn depth_first(mut self) -> SearchOutcome {
        let mut stack = vec![self.start];

        while let Some(current) = stack.pop() {
            if !self.closed.insert(current) {
                continue;
            }
            if !self.expand() {
                return self.aborted();
            }
            if current == self.goal {
                return self.found();
            }

            let next: Vec<Cell> = self
                .successors(current)
                .filter(|cell| !self.closed.contains(cell))
                .collect();
            for cell in &next {
                self.parent.entry(*cell).or_insert(current);
            }
            // Reversed so the first generated neighbour is popped first
            stack.extend(next.into_iter().rev());
        }

        self.unreachable()
    }

    fn breadth_first(mut self) -> SearchOutcome {
        let mut queue = VecDeque::from([self.start]);
        self.closed.insert(self.start);

        while let Some(current) = queue.pop_front() {
            if !self.expand() {
                return self.aborted();
            }
            if current == self.goal {
                return self.found();
            }

            let next: Vec<Cell> = self
                .successors(current)
                .filter(|cell| !self.closed.contains(cell))
                .collect();
            for cell in next {
                self.closed.insert(cell);
                self.parent.insert(cell, current);
                queue.push_back(cell);
            }
        }

        self.unreachable()
    }

    fn a_star(mut self) -> SearchOutcome {
        let mut open = BinaryHeap::new();
        open.push(Reverse((self.start.manhattan(self.goal), 0u32, self.start)));
        self.g_score.insert(self.start, 0);

        while let Some(Reverse((_, g, current))) = open.pop() {
            if !self.closed.insert(current) {
                continue;
            }
            if !self.expand() {
                return self.aborted();
            }
            if current == self.goal {
                return self.found();
            }

            let next: Vec<Cell> = self
                .successors(current)
                .filter(|cell| !self.closed.contains(cell))
                .collect();
            let tentative = g + 1;
            for cell in next {
                let improved = match self.g_score.get(&cell) {
                    Some(best) => tentative < *best,
                    None => true,
                };
                if improved {
                    self.parent.insert(cell, current);
                    self.g_score.insert(cell, tentative);
                    open.push(Reverse((tentative + cell.manhattan(self.goal), tentative, cell)));
                }
            }
        }

        self.unreachable()
    }

    fn greedy_best_first(mut self) -> SearchOutcome {
        let mut open = BinaryHeap::new();
        open.push(Reverse((self.start.manhattan(self.goal), self.start)));

        while let Some(Reverse((_, current))) = open.pop() {
            if !self.closed.insert(current) {
                continue;
            }
            if !self.expand() {
                return self.aborted();
            }
            if current == self.goal {
                return self.found();
            }

            let next: Vec<Cell> = self
                .successors(current)
                .filter(|cell| !self.closed.contains(cell))
                .collect();
            for cell in next {
                if let Entry::Vacant(entry) = self.parent.entry(cell) {
                    entry.insert(current);
                    open.push(Reverse((cell.manhattan(self.goal), cell)));
                }
            }
        }

        self.unreachable()
    }
}

/// A configured search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pathfinder {
    strategy: SearchStrategy,
    expansion_limit: Option<usize>,
}

impl Pathfinder {
    pub fn new(strategy: SearchStrategy) -> Self {
        Self {
            strategy,
            expansion_limit: None,
        }
    }

    /// Abandon searches after `limit` expansions
    pub fn with_expansion_limit(mut self, limit: usize) -> Self {
        self.expansion_limit = Some(limit);
        self
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// Path from `start` to `goal` inclusive, empty when there is none
    pub fn search(&self, grid: &GridWorld, start: Cell, goal: Cell) -> Vec<Cell> {
        self.search_with_stats(grid, start, goal).path
    }

    pub fn search_with_stats(&self, grid: &GridWorld, start: Cell, goal: Cell) -> SearchOutcome {
        if !grid.is_passable(start) || !grid.is_passable(goal) {
            return SearchOutcome::empty(SearchStatus::Unreachable, 0);
        }

        let state = SearchState::new(grid, start, goal, self.expansion_limit);
        match self.strategy {
            SearchStrategy::DepthFirst => state.depth_first(),
            SearchStrategy::BreadthFirst => state.breadth_first(),
            SearchStrategy::AStar => state.a_star(),
            SearchStrategy::GreedyBestFirst => state.greedy_best_first(),
        }
    }
}

/// Aggregate cost of one strategy over a batch of queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyReport {
    pub strategy: SearchStrategy,
    pub searches: usize,
    pub found: usize,
    /// Sum of expansions over all queries (search cost)
    pub total_expanded: usize,
    /// Sum of path edge counts over successful queries (final cost)
    pub total_path_cost: usize,
}

impl StrategyReport {
    pub fn mean_expanded(&self) -> f64 {
        if self.searches == 0 {
            return 0.0;
        }
        self.total_expanded as f64 / self.searches as f64
    }

    pub fn mean_path_cost(&self) -> f64 {
        if self.found == 0 {
            return 0.0;
        }
        self.total_path_cost as f64 / self.found as f64
    }
}

/// Run every strategy over the same queries
pub fn compare_strategies(grid: &GridWorld, queries: &[(Cell, Cell)]) -> Vec<StrategyReport> {
    SearchStrategy::ALL
        .iter()
        .map(|strategy| {
            let pathfinder = Pathfinder::new(*strategy);
            let mut report = StrategyReport {
                strategy: *strategy,
                searches: queries.len(),
                found: 0,
                total_expanded: 0,
                total_path_cost: 0,
            };
            for (start, goal) in queries {
                let outcome = pathfinder.search_with_stats(grid, *start, *goal);
                report.total_expanded += outcome.expanded;
                if outcome.status == SearchStatus::Found {
                    report.found += 1;
                    report.total_path_cost += outcome.path_cost();
                }
            }
            report
        })
        .collect()
}
