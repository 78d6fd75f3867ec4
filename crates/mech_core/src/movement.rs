//! Movement resolution.
//!
//! Movement works on an already-adjusted MP budget: heat and damage
//! penalties are folded in by [`MovementBudget::for_unit`] before any path is
//! checked. Facing changes are free; every hex entered costs its terrain
//! cost plus elevation change.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};

use crate::error::ActionError;
use crate::heat;
use crate::hex::{HexCoordinate, HexDirection};
use crate::map::BattleMap;
use crate::state::{UnitCombatState, UnitId};
use crate::unit::SlotContent;

/// How a unit moved this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovementType {
    /// Did not move.
    #[default]
    Stationary,
    /// Walked.
    Walk,
    /// Ran.
    Run,
    /// Jumped.
    Jump,
}

impl MovementType {
    /// To-hit modifier for attacks made after moving this way.
    #[must_use]
    pub const fn attacker_modifier(self) -> i32 {
        match self {
            Self::Stationary => 0,
            Self::Walk => 1,
            Self::Run => 2,
            Self::Jump => 3,
        }
    }

    /// Lower-case name used in rejection messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stationary => "stationary",
            Self::Walk => "walk",
            Self::Run => "run",
            Self::Jump => "jump",
        }
    }
}

/// Target movement modifier from hexes moved this turn; jumping adds 1.
#[must_use]
pub const fn target_movement_modifier(movement: MovementType, hexes_moved: u32) -> i32 {
    let base = match hexes_moved {
        0..=2 => 0,
        3..=4 => 1,
        5..=6 => 2,
        7..=9 => 3,
        10..=17 => 4,
        18..=24 => 5,
        _ => 6,
    };
    if matches!(movement, MovementType::Jump) {
        base + 1
    } else {
        base
    }
}

/// Run MP for a walking MP: `ceil(walk * 1.5)`.
#[must_use]
pub const fn run_mp(walk: u32) -> u32 {
    (walk * 3).div_ceil(2)
}

/// Effective MP available to a unit this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementBudget {
    /// Walking MP after heat and damage.
    pub walk: u32,
    /// Running MP, `None` if running is impossible.
    pub run: Option<u32>,
    /// Jumping MP after destroyed jets.
    pub jump: u32,
}

impl MovementBudget {
    /// Compute the budget for a unit from its current heat and damage.
    #[must_use]
    pub fn for_unit(unit: &UnitCombatState) -> Self {
        let definition = &unit.definition;
        let leg_destroyed = unit.destroyed_legs() > 0;

        let mut walk = definition
            .walk_mp
            .saturating_sub(heat::movement_penalty(unit.heat))
            .saturating_sub(unit.count_damaged(SlotContent::is_leg_actuator));
        for _ in 0..unit.count_damaged(|slot| slot == SlotContent::Hip) {
            walk = walk.div_ceil(2);
        }
        if leg_destroyed {
            walk = walk.min(1);
        }

        let jump = definition
            .jump_mp
            .saturating_sub(unit.count_lost(|slot| slot == SlotContent::JumpJet));

        Self {
            walk,
            run: if leg_destroyed || walk == 0 {
                None
            } else {
                Some(run_mp(walk))
            },
            jump,
        }
    }

    /// MP available for a movement mode, `None` if the mode is unavailable.
    #[must_use]
    pub const fn mp_for(&self, movement: MovementType) -> Option<u32> {
        match movement {
            MovementType::Stationary => Some(0),
            MovementType::Walk => {
                if self.walk > 0 {
                    Some(self.walk)
                } else {
                    None
                }
            }
            MovementType::Run => self.run,
            MovementType::Jump => {
                if self.jump > 0 {
                    Some(self.jump)
                } else {
                    None
                }
            }
        }
    }
}

/// Occupancy the mover has to respect.
#[derive(Debug, Clone)]
pub struct MovementContext<'a> {
    /// The battlefield.
    pub map: &'a BattleMap,
    /// Hexes holding enemy units; ground movement cannot pass through them.
    pub enemy_hexes: BTreeSet<HexCoordinate>,
    /// Hexes holding any other unit; no move may end there.
    pub occupied_hexes: BTreeSet<HexCoordinate>,
}

impl<'a> MovementContext<'a> {
    /// Context over a map with no other units.
    #[must_use]
    pub fn new(map: &'a BattleMap) -> Self {
        Self {
            map,
            enemy_hexes: BTreeSet::new(),
            occupied_hexes: BTreeSet::new(),
        }
    }

    /// Build the context for one unit from every other unit on the field.
    #[must_use]
    pub fn for_unit<'u>(
        map: &'a BattleMap,
        mover: UnitId,
        units: impl IntoIterator<Item = &'u UnitCombatState>,
    ) -> Self {
        let mut context = Self::new(map);
        let mut side = None;
        let mut others = Vec::new();
        for unit in units {
            if unit.id == mover {
                side = Some(unit.side);
            } else if !unit.destroyed {
                others.push((unit.side, unit.position.hex));
            }
        }
        for (other_side, hex) in others {
            context.occupied_hexes.insert(hex);
            if Some(other_side) != side {
                context.enemy_hexes.insert(hex);
            }
        }
        context
    }
}

#[derive(Debug, PartialEq, Eq)]
struct SearchNode {
    cost: u32,
    hex: HexCoordinate,
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost, then lowest coordinate for determinism
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.hex.cmp(&self.hex))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cheapest ground cost from `start` to every reachable hex within `mp`,
/// with the hex each one was entered from.
fn ground_search(
    context: &MovementContext<'_>,
    start: HexCoordinate,
    mp: u32,
    running: bool,
) -> (BTreeMap<HexCoordinate, u32>, BTreeMap<HexCoordinate, HexCoordinate>) {
    let map = context.map;
    let mut best = BTreeMap::new();
    let mut came_from = BTreeMap::new();
    let mut open = BinaryHeap::new();
    best.insert(start, 0);
    open.push(SearchNode { cost: 0, hex: start });

    while let Some(SearchNode { cost, hex }) = open.pop() {
        if best.get(&hex).is_some_and(|&known| known < cost) {
            continue;
        }
        for next in hex.neighbors() {
            if context.enemy_hexes.contains(&next) {
                continue;
            }
            let Some(step) = map.movement_cost(hex, next, running) else {
                continue;
            };
            let total = cost + step;
            if total > mp {
                continue;
            }
            if best.get(&next).map_or(true, |&known| total < known) {
                best.insert(next, total);
                came_from.insert(next, hex);
                open.push(SearchNode { cost: total, hex: next });
            }
        }
    }
    (best, came_from)
}

fn ground_costs(
    context: &MovementContext<'_>,
    start: HexCoordinate,
    mp: u32,
    running: bool,
) -> BTreeMap<HexCoordinate, u32> {
    ground_search(context, start, mp, running).0
}

/// Cheapest legal path from `start` to `goal`, excluding the start.
///
/// A jump path is just the landing hex. Returns `None` when `goal` cannot
/// be reached with `mp` or is occupied.
#[must_use]
pub fn find_path(
    context: &MovementContext<'_>,
    start: HexCoordinate,
    goal: HexCoordinate,
    movement: MovementType,
    mp: u32,
) -> Option<Vec<HexCoordinate>> {
    if goal == start || context.occupied_hexes.contains(&goal) || !context.map.is_in_bounds(goal) {
        return None;
    }
    match movement {
        MovementType::Stationary => None,
        MovementType::Jump => (start.distance(goal) <= mp).then(|| vec![goal]),
        MovementType::Walk | MovementType::Run => {
            let (best, came_from) = ground_search(context, start, mp, movement == MovementType::Run);
            if !best.contains_key(&goal) {
                return None;
            }
            let mut path = vec![goal];
            let mut current = goal;
            while let Some(&previous) = came_from.get(&current) {
                if previous == start {
                    break;
                }
                path.push(previous);
                current = previous;
            }
            path.reverse();
            Some(path)
        }
    }
}

/// Every hex a unit at `start` can end its movement in.
///
/// The start hex itself is excluded; holding position is a separate action.
#[must_use]
pub fn valid_destinations(
    context: &MovementContext<'_>,
    start: HexCoordinate,
    movement: MovementType,
    mp: u32,
) -> BTreeSet<HexCoordinate> {
    let map = context.map;
    match movement {
        MovementType::Stationary => BTreeSet::new(),
        MovementType::Jump => start
            .hexes_in_range(mp)
            .into_iter()
            .filter(|&hex| {
                hex != start && map.is_in_bounds(hex) && !context.occupied_hexes.contains(&hex)
            })
            .collect(),
        MovementType::Walk | MovementType::Run => {
            ground_costs(context, start, mp, movement == MovementType::Run)
                .into_keys()
                .filter(|&hex| hex != start && !context.occupied_hexes.contains(&hex))
                .collect()
        }
    }
}

/// MP spent along a path (excluding the start hex).
///
/// Jumps cost their straight-line distance regardless of terrain. Returns
/// `None` if a ground path is not contiguous or crosses impassable terrain.
#[must_use]
pub fn path_cost(
    map: &BattleMap,
    start: HexCoordinate,
    path: &[HexCoordinate],
    movement: MovementType,
) -> Option<u32> {
    match movement {
        MovementType::Stationary => path.is_empty().then_some(0),
        MovementType::Jump => path.last().map(|&end| start.distance(end)),
        MovementType::Walk | MovementType::Run => {
            map.path_cost(start, path, movement == MovementType::Run)
        }
    }
}

/// A requested move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDeclaration {
    /// Moving unit.
    pub unit: UnitId,
    /// Movement mode.
    pub movement: MovementType,
    /// Hexes entered in order, excluding the start. A jump lists only its
    /// landing hex.
    pub path: Vec<HexCoordinate>,
    /// Facing at the end of the move.
    pub facing: HexDirection,
}

/// A checked move ready to become an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPlan {
    /// Final hex.
    pub destination: HexCoordinate,
    /// Final facing.
    pub facing: HexDirection,
    /// MP spent.
    pub mp_spent: u32,
    /// Hexes counted for the target movement modifier.
    pub hexes_moved: u32,
}

/// Check a declared path against terrain, occupancy and the MP budget.
///
/// # Errors
/// Returns the [`ActionError`] describing why the path is illegal.
pub fn validate_path(
    context: &MovementContext<'_>,
    start: HexCoordinate,
    declaration: &MovementDeclaration,
    mp: u32,
) -> Result<MovementPlan, ActionError> {
    let map = context.map;
    let Some(&destination) = declaration.path.last() else {
        return Err(ActionError::IllegalPath("path is empty".to_string()));
    };

    for &hex in &declaration.path {
        if !map.is_in_bounds(hex) {
            return Err(ActionError::OutOfBounds(hex));
        }
    }
    if destination == start {
        return Err(ActionError::IllegalPath(
            "path ends where it started".to_string(),
        ));
    }
    if context.occupied_hexes.contains(&destination) {
        return Err(ActionError::HexOccupied(destination));
    }

    let (mp_spent, hexes_moved) = match declaration.movement {
        MovementType::Stationary => {
            return Err(ActionError::IllegalPath(
                "stationary units do not declare a path".to_string(),
            ));
        }
        MovementType::Jump => {
            if declaration.path.len() != 1 {
                return Err(ActionError::IllegalPath(
                    "a jump lists only its landing hex".to_string(),
                ));
            }
            let distance = start.distance(destination);
            (distance, distance)
        }
        MovementType::Walk | MovementType::Run => {
            let running = declaration.movement == MovementType::Run;
            let mut current = start;
            let mut total = 0;
            for &hex in &declaration.path {
                if current.distance(hex) != 1 {
                    return Err(ActionError::IllegalPath(format!(
                        "({}, {}) is not adjacent to ({}, {})",
                        hex.q, hex.r, current.q, current.r
                    )));
                }
                if context.enemy_hexes.contains(&hex) {
                    return Err(ActionError::IllegalPath(format!(
                        "cannot move through enemy unit at ({}, {})",
                        hex.q, hex.r
                    )));
                }
                let step = map.movement_cost(current, hex, running).ok_or_else(|| {
                    ActionError::IllegalPath(format!("cannot enter ({}, {})", hex.q, hex.r))
                })?;
                total += step;
                current = hex;
            }
            (total, declaration.path.len() as u32)
        }
    };

    if mp_spent > mp {
        return Err(ActionError::InsufficientMovementPoints {
            required: mp_spent,
            available: mp,
        });
    }

    Ok(MovementPlan {
        destination,
        facing: declaration.facing,
        mp_spent,
        hexes_moved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::MapConfig;
    use crate::map::{Terrain, TerrainHex};

    fn open_map() -> BattleMap {
        BattleMap::open(MapConfig::new(12, 12))
    }

    fn walk(unit: UnitId, path: Vec<HexCoordinate>) -> MovementDeclaration {
        MovementDeclaration {
            unit,
            movement: MovementType::Walk,
            path,
            facing: HexDirection::North,
        }
    }

    #[test]
    fn test_run_mp_rounds_up() {
        assert_eq!(run_mp(4), 6);
        assert_eq!(run_mp(5), 8);
        assert_eq!(run_mp(1), 2);
    }

    #[test]
    fn test_target_movement_modifier_table() {
        assert_eq!(target_movement_modifier(MovementType::Walk, 2), 0);
        assert_eq!(target_movement_modifier(MovementType::Walk, 3), 1);
        assert_eq!(target_movement_modifier(MovementType::Run, 6), 2);
        assert_eq!(target_movement_modifier(MovementType::Run, 9), 3);
        assert_eq!(target_movement_modifier(MovementType::Run, 10), 4);
        assert_eq!(target_movement_modifier(MovementType::Jump, 4), 2);
        assert_eq!(target_movement_modifier(MovementType::Stationary, 0), 0);
    }

    #[test]
    fn test_walk_destinations_on_open_ground() {
        let map = open_map();
        let context = MovementContext::new(&map);
        let start = HexCoordinate::new(5, 3);
        let reachable = valid_destinations(&context, start, MovementType::Walk, 2);
        // 18 hexes within two steps, minus the start itself
        assert_eq!(reachable.len(), 18);
        assert!(!reachable.contains(&start));
    }

    #[test]
    fn test_enemy_blocks_passage_but_friend_does_not() {
        let map = open_map();
        let start = HexCoordinate::new(2, 2);
        let beyond = HexCoordinate::new(4, 2);
        let blocker = HexCoordinate::new(3, 2);

        let mut context = MovementContext::new(&map);
        context.occupied_hexes.insert(blocker);
        let path = vec![blocker, beyond];
        assert!(validate_path(&context, start, &walk(1, path.clone()), 2).is_ok());

        context.enemy_hexes.insert(blocker);
        assert!(matches!(
            validate_path(&context, start, &walk(1, path), 2),
            Err(ActionError::IllegalPath(_))
        ));
    }

    #[test]
    fn test_insufficient_mp_rejected() {
        let map = open_map();
        let context = MovementContext::new(&map);
        let start = HexCoordinate::new(0, 0);
        let path: Vec<_> = (1..=5).map(|q| HexCoordinate::new(q, 0)).collect();
        let result = validate_path(&context, start, &walk(1, path), 4);
        assert_eq!(
            result,
            Err(ActionError::InsufficientMovementPoints {
                required: 5,
                available: 4
            })
        );
    }

    #[test]
    fn test_terrain_costs_in_path() {
        let mut map = open_map();
        map.set_terrain(
            HexCoordinate::new(1, 0),
            TerrainHex { terrain: Terrain::HeavyWoods, elevation: 0 },
        );
        let context = MovementContext::new(&map);
        let path = vec![HexCoordinate::new(1, 0), HexCoordinate::new(2, 0)];
        let plan = validate_path(&context, HexCoordinate::new(0, 0), &walk(1, path.clone()), 4)
            .expect("legal path");
        assert_eq!(plan.mp_spent, 4);
        assert_eq!(plan.hexes_moved, 2);
        assert_eq!(
            path_cost(&map, HexCoordinate::new(0, 0), &path, MovementType::Walk),
            Some(4)
        );
    }

    #[test]
    fn test_find_path_goes_around_woods() {
        let mut map = open_map();
        map.set_terrain(
            HexCoordinate::new(1, 0),
            TerrainHex { terrain: Terrain::HeavyWoods, elevation: 0 },
        );
        let context = MovementContext::new(&map);
        let start = HexCoordinate::new(0, 0);
        let goal = HexCoordinate::new(2, 0);
        let path = find_path(&context, start, goal, MovementType::Walk, 3).expect("reachable");
        assert_eq!(path.last(), Some(&goal));
        assert!(!path.contains(&HexCoordinate::new(1, 0)));
        assert_eq!(path_cost(&map, start, &path, MovementType::Walk), Some(3));
        assert!(validate_path(&context, start, &walk(1, path), 3).is_ok());
        assert_eq!(find_path(&context, start, goal, MovementType::Walk, 2), None);
        assert_eq!(
            find_path(&context, start, goal, MovementType::Jump, 2),
            Some(vec![goal])
        );
    }

    #[test]
    fn test_jump_ignores_terrain() {
        let mut map = open_map();
        map.set_terrain(
            HexCoordinate::new(1, 1),
            TerrainHex { terrain: Terrain::Clear, elevation: 6 },
        );
        let context = MovementContext::new(&map);
        let declaration = MovementDeclaration {
            unit: 1,
            movement: MovementType::Jump,
            path: vec![HexCoordinate::new(3, 1)],
            facing: HexDirection::South,
        };
        let plan = validate_path(&context, HexCoordinate::new(0, 1), &declaration, 3)
            .expect("legal jump");
        assert_eq!(plan.mp_spent, 3);
        assert_eq!(plan.facing, HexDirection::South);
    }

    #[test]
    fn test_non_adjacent_step_rejected() {
        let map = open_map();
        let context = MovementContext::new(&map);
        let path = vec![HexCoordinate::new(2, 0)];
        assert!(matches!(
            validate_path(&context, HexCoordinate::new(0, 0), &walk(1, path), 5),
            Err(ActionError::IllegalPath(_))
        ));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let map = open_map();
        let context = MovementContext::new(&map);
        let path = vec![HexCoordinate::new(-1, 0)];
        assert_eq!(
            validate_path(&context, HexCoordinate::new(0, 0), &walk(1, path), 5),
            Err(ActionError::OutOfBounds(HexCoordinate::new(-1, 0)))
        );
    }
}
