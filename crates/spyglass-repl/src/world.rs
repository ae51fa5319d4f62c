//! A small game world for the REPL to browse.
//!
//! The world lives in a [`MemoryHost`] and covers every editor the inspector
//! offers: numbers and strings, a flags enum, a value struct, a color, a list,
//! a dictionary, a static settings class, an open generic type, a throwing
//! property and a generic method.

use anyhow::Result;
use spyglass_core::host::{Color, Color32, ColorF, HostError, Number, NumberKind, ParamInfo};
use spyglass_core::{MemoryHost, TypeBuilder, TypeRef, Value};

/// Handles into the demo world
#[derive(Debug, Clone)]
pub struct DemoWorld {
    /// The player object the REPL opens first
    pub player: Value,
    pub settings: TypeRef,
}

const HEALTH_FIELD: &str = "<Health>k__BackingField";

/// Registers the demo types and allocates the player
pub fn build(host: &MemoryHost) -> Result<DemoWorld> {
    let i32_type = TypeRef::number(NumberKind::I32);
    let f32_type = TypeRef::number(NumberKind::F32);

    let element = host.register(TypeBuilder::enumeration(
        "Game.Element",
        &[("None", 0), ("Fire", 1), ("Ice", 2), ("Poison", 4), ("Shock", 8)],
        true,
    ));
    let class = host.register(TypeBuilder::enumeration(
        "Game.Class",
        &[("Warrior", 0), ("Mage", 1), ("Rogue", 2)],
        false,
    ));
    let vector = host.register(
        TypeBuilder::structure("Math.Vector3")
            .field("x", &f32_type)
            .field("y", &f32_type)
            .field("z", &f32_type),
    );
    let item = host.register(
        TypeBuilder::class("Game.Item")
            .field("name", &TypeRef::string())
            .field("weight", &f32_type)
            .default_constructor(),
    );
    let settings = host.register(
        TypeBuilder::static_class("Game.Settings")
            .static_field("volume", &f32_type, Value::f32(0.8))
            .static_field("difficulty", &i32_type, Value::i32(2))
            .static_field("frame", &TypeRef::number(NumberKind::U64), Value::Number(Number::U64(0)))
            .const_field("MaxPlayers", &i32_type, Value::i32(4))
            .static_property("Version", &TypeRef::string(), |_, _, _| Ok(Value::str("1.4.2"))),
    );
    host.register(
        TypeBuilder::class("Collections.Pool")
            .generic(&["T"])
            .static_field("capacity", &i32_type, Value::i32(16))
            .field("items", &host.list_type(&TypeRef::generic_param("T"))),
    );

    let inventory_type = host.list_type(&item);
    let titles_type = host.list_type(&TypeRef::string());
    let stats_type = host.map_type(&TypeRef::string(), &i32_type);
    let player_type = host.register(
        TypeBuilder::class("Game.Player")
            .field("name", &TypeRef::string())
            .field("level", &i32_type)
            .field("alive", &TypeRef::bool())
            .field("class", &class)
            .field("resist", &element)
            .field("position", &vector)
            .field("tint", &TypeRef::color())
            .field("badge", &TypeRef::color32())
            .field("inventory", &inventory_type)
            .field("titles", &titles_type)
            .field("stats", &stats_type)
            .readonly_field("frames", &i32_type)
            .hidden_field(HEALTH_FIELD, &i32_type)
            .property_rw(
                "Health",
                &i32_type,
                |host, instance, _| host.read_field(instance.ok_or(HostError::NullReference)?, HEALTH_FIELD),
                |host, instance, value, _| {
                    let instance = instance.ok_or(HostError::NullReference)?;
                    let clamped = match value.as_number() {
                        Some(n) => Value::i32(n.as_f64().clamp(0.0, 100.0) as i32),
                        None => return Err(HostError::invalid_cast(&TypeRef::object(), &TypeRef::number(NumberKind::I32))),
                    };
                    host.write_field(instance, HEALTH_FIELD, clamped)
                },
            )
            .property("DamageRatio", &f32_type, |_, _, _| Err(HostError::DivideByZero))
            .method(
                "Heal",
                &i32_type,
                vec![ParamInfo::new("amount", TypeRef::number(NumberKind::I32))],
                |host, instance, args, _| {
                    let instance = instance.ok_or(HostError::NullReference)?;
                    let current = host.read_field(instance, HEALTH_FIELD)?.as_number().map_or(0.0, |n| n.as_f64());
                    let amount = args.first().and_then(Value::as_number).map_or(0.0, |n| n.as_f64());
                    let healed = Value::i32((current + amount).clamp(0.0, 100.0) as i32);
                    host.write_field(instance, HEALTH_FIELD, healed.clone())?;
                    Ok(healed)
                },
            )
            .method("Describe", &TypeRef::string(), Vec::new(), |host, instance, _, _| {
                let instance = instance.ok_or(HostError::NullReference)?;
                let name = host.read_field(instance, "name")?;
                let level = host.read_field(instance, "level")?;
                Ok(Value::str(format!("{name} (level {level})")))
            })
            .generic_method(
                "Echo",
                &TypeRef::generic_param("T"),
                &["T"],
                vec![ParamInfo::new("value", TypeRef::generic_param("T"))],
                |_, _, args, _| Ok(args.first().cloned().unwrap_or_default()),
            ),
    );

    let mut player = host.alloc(&player_type);
    host.write_field(&mut player, "name", Value::str("Ada"))?;
    host.write_field(&mut player, "level", Value::i32(7))?;
    host.write_field(&mut player, "alive", Value::Bool(true))?;
    host.write_field(&mut player, HEALTH_FIELD, Value::i32(80))?;
    host.write_field(&mut player, "class", Value::Enum { ty: class, bits: 1 })?;
    host.write_field(&mut player, "resist", Value::Enum { ty: element, bits: 1 | 4 })?;
    let mut position = host.default_value(&vector);
    host.write_field(&mut position, "x", Value::f32(1.5))?;
    host.write_field(&mut position, "z", Value::f32(-3.0))?;
    host.write_field(&mut player, "position", position)?;
    host.write_field(
        &mut player,
        "tint",
        Value::Color(Color::Float(ColorF {
            r: 1.0,
            g: 0.5,
            b: 0.25,
            a: 1.0,
        })),
    )?;
    host.write_field(
        &mut player,
        "badge",
        Value::Color(Color::Byte(Color32 {
            r: 200,
            g: 40,
            b: 40,
            a: 255,
        })),
    )?;

    let mut items = Vec::new();
    for (name, weight) in [("Sword", 3.5), ("Potion", 0.5), ("Map", 0.1)] {
        let mut entry = host.alloc(&item);
        host.write_field(&mut entry, "name", Value::str(name))?;
        host.write_field(&mut entry, "weight", Value::f32(weight))?;
        items.push(entry);
    }
    let inventory = host.alloc_list(&inventory_type, items, false);
    host.write_field(&mut player, "inventory", inventory)?;
    let titles = host.alloc_list(
        &titles_type,
        vec![Value::str("Wanderer"), Value::str("Cartographer")],
        true,
    );
    host.write_field(&mut player, "titles", titles)?;
    let stats = host.alloc_map(
        &stats_type,
        vec![
            (Value::str("strength"), Value::i32(12)),
            (Value::str("wisdom"), Value::i32(17)),
            (Value::str("luck"), Value::i32(3)),
        ],
    );
    host.write_field(&mut player, "stats", stats)?;

    Ok(DemoWorld { player, settings })
}

/// Moves the world one frame forward
pub fn advance(host: &MemoryHost, world: &DemoWorld) -> Result<()> {
    let mut player = world.player.clone();
    let frames = host.read_field(&player, "frames")?.as_number().map_or(0.0, |n| n.as_f64());
    host.write_field(&mut player, "frames", Value::i32(frames as i32 + 1))?;

    let frame = host
        .static_value(&world.settings, "frame")?
        .as_number()
        .and_then(|n| n.as_i128())
        .unwrap_or(0);
    host.set_static_value(
        &world.settings,
        "frame",
        Value::Number(Number::U64(frame as u64 + 1)),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_builds_a_populated_player() {
        let host = MemoryHost::new();
        let world = build(&host).unwrap();
        assert_eq!(host.read_field(&world.player, "name").unwrap(), Value::str("Ada"));
        assert_eq!(host.read_field(&world.player, HEALTH_FIELD).unwrap(), Value::i32(80));
        assert!(!host.read_field(&world.player, "stats").unwrap().is_null());
    }

    #[test]
    fn advance_counts_frames() {
        let host = MemoryHost::new();
        let world = build(&host).unwrap();
        advance(&host, &world).unwrap();
        advance(&host, &world).unwrap();
        assert_eq!(host.read_field(&world.player, "frames").unwrap(), Value::i32(2));
    }
}
