//! Shared fixture types: a small game-state graph exercising every field
//! category. Registration is idempotent, so every test calls
//! [`register_all`] up front.
#![allow(dead_code)]

use std::collections::BTreeMap;

use statewire_engine::{
    Codec, DecodeError, LineReader, LineWriter, Persist, TypeBuilder, wire_enum,
};

wire_enum! {
    pub enum Phase { Lobby, Deploy, Battle, Cleanup }
}

/// Base stats shared by every unit type.
#[derive(Default, Debug)]
pub struct Stats {
    pub hp: i32,
    pub mp: i32,
}

impl Persist for Stats {
    const TYPE_NAME: &'static str = "Stats";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("hp", Codec::<i32>::scalar(), |s| &s.hp, |s| &mut s.hp)
            .field("mp", Codec::<i32>::scalar(), |s| &s.mp, |s| &mut s.mp);
    }
}

/// A unit inheriting the base stats.
#[derive(Default, Debug)]
pub struct Unit {
    pub stats: Stats,
    pub name: String,
    pub level: u32,
}

impl Persist for Unit {
    const TYPE_NAME: &'static str = "Unit";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.base(|u| &u.stats, |u| &mut u.stats)
            .field("name", Codec::string(), |u| &u.name, |u| &mut u.name)
            .field("level", Codec::<u32>::scalar(), |u| &u.level, |u| &mut u.level);
    }
}

#[derive(Default, Debug)]
pub struct Buff {
    pub strength: i32,
}

impl Persist for Buff {
    const TYPE_NAME: &'static str = "Buff";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field(
            "strength",
            Codec::<i32>::scalar(),
            |x| &x.strength,
            |x| &mut x.strength,
        );
    }
}

#[derive(Default, Debug)]
pub struct Poison {
    pub ticks: i32,
    pub damage: i32,
}

impl Persist for Poison {
    const TYPE_NAME: &'static str = "Poison";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("ticks", Codec::<i32>::scalar(), |x| &x.ticks, |x| &mut x.ticks)
            .field("damage", Codec::<i32>::scalar(), |x| &x.damage, |x| &mut x.damage);
    }
}

/// Board position with a compact custom wire form (`x,y`).
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

pub fn coord_codec() -> Codec<Coord> {
    Codec::custom(
        |c: &Coord, prefix: &str, w: &mut LineWriter<'_>| {
            w.line(&format!("{prefix}{},{}", c.x, c.y))?;
            Ok(())
        },
        |c: &mut Coord, value: &str, r: &mut LineReader<'_>| {
            let malformed = || DecodeError::MalformedValue {
                expected: "x,y coordinate".to_string(),
                found: value.to_string(),
                line: r.line_number(),
            };
            let (x, y) = value.split_once(',').ok_or_else(|| malformed())?;
            c.x = x.parse().map_err(|_| malformed())?;
            c.y = y.parse().map_err(|_| malformed())?;
            Ok(())
        },
        |a: &Coord, b: &Coord| a == b,
    )
}

/// The root fixture: one field per category.
#[derive(Default, Debug)]
pub struct Player {
    pub score: i32,
    pub name: String,
    pub phase: Phase,
    pub champion: Unit,
    pub ally: Option<Unit>,
    pub inventory: Vec<i32>,
    pub grid: Vec<Vec<Option<i32>>>,
    pub flags: BTreeMap<String, bool>,
    pub effects: statewire_engine::DynList,
    pub position: Coord,
}

impl Persist for Player {
    const TYPE_NAME: &'static str = "Player";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("score", Codec::<i32>::scalar(), |p| &p.score, |p| &mut p.score)
            .field("name", Codec::string(), |p| &p.name, |p| &mut p.name)
            .field("phase", Codec::<Phase>::enumeration(), |p| &p.phase, |p| &mut p.phase)
            .field("champion", Codec::<Unit>::nested(), |p| &p.champion, |p| &mut p.champion)
            .field(
                "ally",
                Codec::optional(Codec::<Unit>::nested()),
                |p| &p.ally,
                |p| &mut p.ally,
            )
            .field(
                "inventory",
                Codec::array(Codec::<i32>::scalar()),
                |p| &p.inventory,
                |p| &mut p.inventory,
            )
            .field(
                "grid",
                Codec::array(Codec::array(Codec::optional(Codec::<i32>::scalar()))),
                |p| &p.grid,
                |p| &mut p.grid,
            )
            .field(
                "flags",
                Codec::map(Codec::<bool>::scalar()),
                |p| &p.flags,
                |p| &mut p.flags,
            )
            .field("effects", Codec::list(), |p| &p.effects, |p| &mut p.effects)
            .field("position", coord_codec(), |p| &p.position, |p| &mut p.position);
    }
}

/// Per-instance suppression: cards are only written once revealed.
#[derive(Default, Debug)]
pub struct HiddenHand {
    pub reveal: bool,
    pub cards: Vec<i32>,
}

impl Persist for HiddenHand {
    const TYPE_NAME: &'static str = "HiddenHand";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("reveal", Codec::<bool>::scalar(), |h| &h.reveal, |h| &mut h.reveal)
            .field(
                "cards",
                Codec::array(Codec::<i32>::scalar()),
                |h| &h.cards,
                |h| &mut h.cards,
            );
    }

    fn omit(&self, field: &str) -> bool {
        field == "cards" && !self.reveal
    }
}

pub fn register_all() {
    statewire_engine::register::<Stats>().expect("register Stats");
    statewire_engine::register::<Unit>().expect("register Unit");
    statewire_engine::register::<Buff>().expect("register Buff");
    statewire_engine::register::<Poison>().expect("register Poison");
    statewire_engine::register::<Player>().expect("register Player");
    statewire_engine::register::<HiddenHand>().expect("register HiddenHand");
}

/// A populated player used by the round-trip and diff suites.
pub fn sample_player() -> Player {
    let mut effects = statewire_engine::DynList::new();
    effects.push(Buff { strength: 3 });
    effects.push_null();
    effects.push(Poison { ticks: 2, damage: 7 });

    Player {
        score: 827,
        name: "Morgan".to_string(),
        phase: Phase::Battle,
        champion: Unit {
            stats: Stats { hp: 40, mp: 12 },
            name: "Vanguard".to_string(),
            level: 5,
        },
        ally: Some(Unit {
            stats: Stats { hp: 25, mp: 30 },
            name: "Oracle".to_string(),
            level: 3,
        }),
        inventory: vec![1, 1, 2, 3, 5],
        grid: vec![vec![Some(1), None], vec![None, Some(4), Some(9)]],
        flags: BTreeMap::from([("ready".to_string(), true), ("afk".to_string(), false)]),
        effects,
        position: Coord { x: 3, y: -4 },
    }
}
