//! Data-driven unit construction.
//!
//! Unit templates are plain data (usually RON) naming weapons from the
//! built-in catalogue. [`UnitTemplate::build`] places equipment into the
//! standard biped slot layout and produces a validated [`UnitDefinition`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::hex::RangeProfile;
use crate::unit::{
    standard_biped_slots, standard_structure, AmmoBin, ArmorAllocation, ArmorType, ClusterProfile,
    HeatSinkType, Location, SlotContent, UnitDefinition, WeaponCategory, WeaponMount, WeaponSpec,
    ENGINE_HEAT_SINKS, HEAD_STRUCTURE,
};

fn direct(
    name: &str,
    category: WeaponCategory,
    damage: u32,
    heat: u32,
    range: (u32, u32),
    slots: usize,
    ammo_per_ton: Option<u32>,
) -> WeaponSpec {
    WeaponSpec {
        name: name.to_string(),
        category,
        damage,
        heat,
        range: RangeProfile::new(range.0, range.1),
        to_hit_modifier: 0,
        cluster: None,
        ammo_per_ton,
        slots,
        indirect_fire: false,
        semi_guided: false,
        tag: false,
    }
}

fn lrm(size: u32, heat: u32, ammo: u32, slots: usize) -> WeaponSpec {
    WeaponSpec {
        cluster: Some(ClusterProfile {
            size,
            damage_per_missile: 1,
            group_size: 5,
        }),
        indirect_fire: true,
        ..direct(
            &format!("LRM-{size}"),
            WeaponCategory::Missile,
            1,
            heat,
            (6, 21),
            slots,
            Some(ammo),
        )
    }
}

fn srm(size: u32, heat: u32, ammo: u32, slots: usize) -> WeaponSpec {
    WeaponSpec {
        cluster: Some(ClusterProfile {
            size,
            damage_per_missile: 2,
            group_size: 1,
        }),
        ..direct(
            &format!("SRM-{size}"),
            WeaponCategory::Missile,
            2,
            heat,
            (0, 9),
            slots,
            Some(ammo),
        )
    }
}

/// Every weapon the catalogue knows about.
#[must_use]
pub fn weapon_catalogue() -> Vec<WeaponSpec> {
    use WeaponCategory::{Ballistic, Energy, Equipment};

    let mut weapons = vec![
        direct("Small Laser", Energy, 3, 1, (0, 3), 1, None),
        direct("Medium Laser", Energy, 5, 3, (0, 9), 1, None),
        direct("Large Laser", Energy, 8, 8, (0, 15), 2, None),
        direct("PPC", Energy, 10, 10, (3, 18), 3, None),
        WeaponSpec {
            to_hit_modifier: -2,
            ..direct("Medium Pulse Laser", Energy, 6, 4, (0, 6), 1, None)
        },
        direct("Machine Gun", Ballistic, 2, 0, (0, 3), 1, Some(200)),
        direct("AC/5", Ballistic, 5, 1, (3, 18), 4, Some(20)),
        direct("AC/10", Ballistic, 10, 3, (0, 15), 7, Some(10)),
        direct("AC/20", Ballistic, 20, 7, (0, 9), 10, Some(5)),
        WeaponSpec {
            cluster: Some(ClusterProfile {
                size: 10,
                damage_per_missile: 1,
                group_size: 1,
            }),
            ..direct("LB 10-X AC", Ballistic, 1, 2, (0, 18), 6, Some(10))
        },
        lrm(5, 2, 24, 1),
        lrm(10, 4, 12, 2),
        lrm(15, 5, 8, 3),
        lrm(20, 6, 6, 5),
        srm(2, 2, 50, 1),
        srm(4, 3, 25, 1),
        srm(6, 4, 15, 2),
        WeaponSpec {
            tag: true,
            ..direct("TAG", Equipment, 0, 0, (0, 15), 1, None)
        },
    ];
    let mut semi_guided = lrm(10, 4, 12, 2);
    semi_guided.name = "Semi-Guided LRM-10".to_string();
    semi_guided.semi_guided = true;
    weapons.push(semi_guided);
    weapons
}

/// Look up a catalogue weapon by name.
#[must_use]
pub fn weapon_spec(name: &str) -> Option<WeaponSpec> {
    weapon_catalogue().into_iter().find(|w| w.name == name)
}

/// Placement of one weapon in a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponPlacement {
    /// Catalogue name.
    pub weapon: String,
    /// Mount location.
    pub location: Location,
    /// Rear-facing mount.
    #[serde(default)]
    pub rear: bool,
}

/// Placement of ammunition in a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmoPlacement {
    /// Catalogue name of the weapon fed.
    pub weapon: String,
    /// Bin location.
    pub location: Location,
    /// Number of one-ton bins.
    #[serde(default = "default_tons")]
    pub tons: u32,
}

const fn default_tons() -> u32 {
    1
}

/// Template describing a unit in catalogue terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTemplate {
    /// Model identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Mass in tons.
    pub tonnage: u32,
    /// Walking MP.
    pub walk_mp: u32,
    /// Jumping MP.
    #[serde(default)]
    pub jump_mp: u32,
    /// Total heat sinks.
    pub heat_sinks: u32,
    /// Heat sink technology.
    #[serde(default)]
    pub heat_sink_type: HeatSinkType,
    /// Default armor type for locations without an override.
    #[serde(default)]
    pub armor_type: ArmorType,
    /// Front/rear armor per location.
    pub armor: BTreeMap<Location, (u32, u32)>,
    /// Per-location armor type overrides.
    #[serde(default)]
    pub armor_overrides: BTreeMap<Location, ArmorType>,
    /// Weapons.
    #[serde(default)]
    pub weapons: Vec<WeaponPlacement>,
    /// Ammunition.
    #[serde(default)]
    pub ammo: Vec<AmmoPlacement>,
    /// Locations protected by CASE.
    #[serde(default)]
    pub case: Vec<Location>,
    /// Battle Value.
    #[serde(default)]
    pub battle_value: u32,
}

/// Order in which leftover heat sinks fill free slots.
const HEAT_SINK_ORDER: [Location; 6] = [
    Location::LeftTorso,
    Location::RightTorso,
    Location::LeftLeg,
    Location::RightLeg,
    Location::LeftArm,
    Location::RightArm,
];

/// Order in which jump jets fill free slots.
const JUMP_JET_ORDER: [Location; 5] = [
    Location::LeftLeg,
    Location::RightLeg,
    Location::LeftTorso,
    Location::RightTorso,
    Location::CenterTorso,
];

impl UnitTemplate {
    /// Parse a template from RON text.
    ///
    /// # Errors
    /// Returns [`GameError::DataParseError`] on malformed input.
    pub fn from_ron_str(source_name: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Build a validated unit definition.
    ///
    /// # Errors
    /// Returns [`GameError::InvalidDefinition`] for unknown weapons, slot
    /// overflow or any construction-rule violation.
    pub fn build(&self) -> Result<UnitDefinition> {
        let invalid = |message: String| GameError::InvalidDefinition {
            unit: self.id.clone(),
            message,
        };

        let (ct, st, arm, leg) = standard_structure(self.tonnage)
            .ok_or_else(|| invalid(format!("unsupported tonnage {}", self.tonnage)))?;
        let structure: BTreeMap<Location, u32> = Location::ALL
            .into_iter()
            .map(|location| {
                let points = match location {
                    Location::Head => HEAD_STRUCTURE,
                    Location::CenterTorso => ct,
                    Location::LeftTorso | Location::RightTorso => st,
                    Location::LeftArm | Location::RightArm => arm,
                    Location::LeftLeg | Location::RightLeg => leg,
                };
                (location, points)
            })
            .collect();

        let armor: BTreeMap<Location, ArmorAllocation> = Location::ALL
            .into_iter()
            .map(|location| {
                let (front, rear) = self.armor.get(&location).copied().unwrap_or((0, 0));
                let armor_type = self
                    .armor_overrides
                    .get(&location)
                    .copied()
                    .unwrap_or(self.armor_type);
                (location, ArmorAllocation { front, rear, armor_type })
            })
            .collect();

        let mut slots = standard_biped_slots();
        let mut place = |location: Location, content: SlotContent, count: usize| -> Result<()> {
            let column = slots
                .get_mut(&location)
                .ok_or_else(|| invalid(format!("no slots at {}", location.abbreviation())))?;
            let free: Vec<usize> = column
                .iter()
                .enumerate()
                .filter(|(_, slot)| **slot == SlotContent::Empty)
                .map(|(index, _)| index)
                .take(count)
                .collect();
            if free.len() < count {
                return Err(invalid(format!(
                    "not enough free slots in {} for {content:?}",
                    location.abbreviation()
                )));
            }
            for index in free {
                column[index] = content;
            }
            Ok(())
        };

        let mut weapons = Vec::with_capacity(self.weapons.len());
        for placement in &self.weapons {
            let spec = weapon_spec(&placement.weapon)
                .ok_or_else(|| invalid(format!("unknown weapon '{}'", placement.weapon)))?;
            place(placement.location, SlotContent::Weapon(weapons.len()), spec.slots)?;
            weapons.push(WeaponMount {
                spec,
                location: placement.location,
                rear_mounted: placement.rear,
            });
        }

        let mut ammo = Vec::new();
        for placement in &self.ammo {
            let spec = weapon_spec(&placement.weapon)
                .ok_or_else(|| invalid(format!("unknown weapon '{}'", placement.weapon)))?;
            let shots = spec
                .ammo_per_ton
                .ok_or_else(|| invalid(format!("'{}' takes no ammunition", placement.weapon)))?;
            for _ in 0..placement.tons {
                place(placement.location, SlotContent::Ammo(ammo.len()), 1)?;
                ammo.push(AmmoBin {
                    weapon: spec.name.clone(),
                    location: placement.location,
                    shots,
                    damage_per_shot: spec.explosion_damage_per_shot(),
                });
            }
        }

        for &location in &self.case {
            place(location, SlotContent::Case, 1)?;
        }

        let per_sink = self.heat_sink_type.slots();
        let mut remaining = self.heat_sinks.saturating_sub(ENGINE_HEAT_SINKS);
        for location in HEAT_SINK_ORDER.into_iter().cycle().take(HEAT_SINK_ORDER.len() * 12) {
            if remaining == 0 {
                break;
            }
            if place(location, SlotContent::HeatSink, per_sink).is_ok() {
                remaining -= 1;
            }
        }
        if remaining > 0 {
            return Err(invalid(format!("no room for {remaining} heat sinks")));
        }

        let mut jets = self.jump_mp;
        for location in JUMP_JET_ORDER.into_iter().cycle().take(JUMP_JET_ORDER.len() * 12) {
            if jets == 0 {
                break;
            }
            if place(location, SlotContent::JumpJet, 1).is_ok() {
                jets -= 1;
            }
        }
        if jets > 0 {
            return Err(invalid(format!("no room for {jets} jump jets")));
        }

        let definition = UnitDefinition {
            id: self.id.clone(),
            name: self.name.clone(),
            tonnage: self.tonnage,
            walk_mp: self.walk_mp,
            jump_mp: self.jump_mp,
            heat_sinks: self.heat_sinks,
            heat_sink_type: self.heat_sink_type,
            armor,
            structure,
            weapons,
            ammo,
            critical_slots: slots,
            battle_value: self.battle_value,
        };
        definition.validate()?;
        Ok(definition)
    }
}

fn weapon(name: &str, location: Location) -> WeaponPlacement {
    WeaponPlacement {
        weapon: name.to_string(),
        location,
        rear: false,
    }
}

fn ammo(name: &str, location: Location, tons: u32) -> AmmoPlacement {
    AmmoPlacement {
        weapon: name.to_string(),
        location,
        tons,
    }
}

fn armor(
    head: u32,
    ct: (u32, u32),
    st: (u32, u32),
    arms: u32,
    legs: u32,
) -> BTreeMap<Location, (u32, u32)> {
    BTreeMap::from([
        (Location::Head, (head, 0)),
        (Location::CenterTorso, ct),
        (Location::LeftTorso, st),
        (Location::RightTorso, st),
        (Location::LeftArm, (arms, 0)),
        (Location::RightArm, (arms, 0)),
        (Location::LeftLeg, (legs, 0)),
        (Location::RightLeg, (legs, 0)),
    ])
}

/// Built-in reference templates.
#[must_use]
pub fn standard_templates() -> Vec<UnitTemplate> {
    use Location::{CenterTorso, Head, LeftArm, LeftTorso, RightArm, RightTorso};

    let base = |id: &str, name: &str, tonnage: u32, walk_mp: u32, heat_sinks: u32| UnitTemplate {
        id: id.to_string(),
        name: name.to_string(),
        tonnage,
        walk_mp,
        jump_mp: 0,
        heat_sinks,
        heat_sink_type: HeatSinkType::Single,
        armor_type: ArmorType::Standard,
        armor: BTreeMap::new(),
        armor_overrides: BTreeMap::new(),
        weapons: Vec::new(),
        ammo: Vec::new(),
        case: Vec::new(),
        battle_value: 0,
    };

    vec![
        UnitTemplate {
            armor: armor(8, (10, 2), (8, 2), 4, 8),
            weapons: vec![
                weapon("Medium Laser", CenterTorso),
                weapon("Machine Gun", LeftArm),
                weapon("Machine Gun", RightArm),
            ],
            ammo: vec![ammo("Machine Gun", CenterTorso, 1)],
            battle_value: 432,
            ..base("LCT-1V", "Locust", 20, 8, 10)
        },
        UnitTemplate {
            armor: armor(9, (16, 4), (12, 4), 10, 14),
            weapons: vec![
                weapon("TAG", LeftArm),
                weapon("Medium Laser", RightArm),
                weapon("Medium Laser", RightArm),
                weapon("SRM-6", RightTorso),
            ],
            ammo: vec![ammo("SRM-6", LeftTorso, 1)],
            battle_value: 708,
            ..base("RVN-3L", "Raven", 35, 6, 10)
        },
        UnitTemplate {
            armor: armor(9, (26, 5), (20, 4), 16, 20),
            weapons: vec![
                weapon("AC/20", RightTorso),
                weapon("Medium Laser", LeftArm),
                weapon("Medium Laser", RightArm),
                weapon("Small Laser", Head),
            ],
            ammo: vec![ammo("AC/20", LeftTorso, 2)],
            battle_value: 1041,
            ..base("HBK-4G", "Hunchback", 50, 4, 13)
        },
        UnitTemplate {
            jump_mp: 4,
            armor: armor(9, (30, 10), (22, 8), 20, 28),
            weapons: vec![
                weapon("LRM-15", LeftArm),
                weapon("LRM-15", RightArm),
                weapon("Medium Laser", LeftTorso),
                weapon("Medium Laser", RightTorso),
            ],
            ammo: vec![ammo("LRM-15", LeftTorso, 1), ammo("LRM-15", RightTorso, 1)],
            battle_value: 1399,
            ..base("CPLT-C1", "Catapult", 65, 4, 15)
        },
        UnitTemplate {
            armor: armor(9, (47, 14), (32, 10), 34, 41),
            weapons: vec![
                weapon("AC/20", RightTorso),
                weapon("LRM-20", LeftTorso),
                weapon("SRM-6", LeftTorso),
                weapon("Medium Laser", LeftArm),
                weapon("Medium Laser", RightArm),
                WeaponPlacement {
                    rear: true,
                    ..weapon("Medium Laser", CenterTorso)
                },
                WeaponPlacement {
                    rear: true,
                    ..weapon("Medium Laser", CenterTorso)
                },
            ],
            ammo: vec![
                ammo("AC/20", RightTorso, 1),
                ammo("LRM-20", LeftTorso, 2),
                ammo("SRM-6", LeftTorso, 1),
            ],
            battle_value: 1897,
            ..base("AS7-D", "Atlas", 100, 3, 20)
        },
    ]
}

/// Look up a built-in template by id.
#[must_use]
pub fn standard_template(id: &str) -> Option<UnitTemplate> {
    standard_templates().into_iter().find(|t| t.id == id)
}
