mod common;

use std::collections::BTreeMap;

use proptest::prelude::*;

use common::{Player, Stats, Unit, register_all, sample_player};
use statewire_engine::{
    Codec, DecodeOptions, MergeOptions, Persist, TypeBuilder, diff, from_document, merge,
    serialize_to_string, structural_eq,
};

#[derive(Default)]
struct History {
    rounds: Vec<BTreeMap<String, i32>>,
}

impl Persist for History {
    const TYPE_NAME: &'static str = "History";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field(
            "rounds",
            Codec::array(Codec::map(Codec::<i32>::scalar())),
            |h| &h.rounds,
            |h| &mut h.rounds,
        );
    }
}

fn grid_strategy() -> impl Strategy<Value = Vec<Vec<Option<i32>>>> {
    prop::collection::vec(
        prop::collection::vec(prop::option::of(any::<i32>()), 0..5),
        0..5,
    )
}

fn rounds_strategy() -> impl Strategy<Value = Vec<BTreeMap<String, i32>>> {
    prop::collection::vec(
        prop::collection::btree_map("[a-z]{1,3}", any::<i32>(), 0..4),
        0..4,
    )
}

proptest! {
    #[test]
    fn scalar_round_trip(hp in any::<i32>(), mp in any::<i32>()) {
        register_all();
        let stats = Stats { hp, mp };
        let text = serialize_to_string(&stats).unwrap();
        let decoded: Stats = from_document(&text, &DecodeOptions::strict()).unwrap();
        prop_assert!(structural_eq(&stats, &decoded).unwrap());
    }

    #[test]
    fn string_round_trip(name in ".*") {
        register_all();
        let unit = Unit { name: name.clone(), ..Unit::default() };
        let text = serialize_to_string(&unit).unwrap();
        let decoded: Unit = from_document(&text, &DecodeOptions::strict()).unwrap();
        prop_assert_eq!(decoded.name, name);
    }

    #[test]
    fn array_diff_converges(
        xs in prop::collection::vec(any::<i32>(), 0..16),
        ys in prop::collection::vec(any::<i32>(), 0..16),
    ) {
        register_all();
        let mut a = sample_player();
        a.inventory = xs;
        let mut b = sample_player();
        b.inventory = ys;

        let patch = diff(&a, &b).unwrap();
        merge(&mut a, &patch, &MergeOptions::default()).unwrap();
        prop_assert!(structural_eq(&a, &b).unwrap());
    }

    #[test]
    fn map_diff_converges(
        left in prop::collection::btree_map("[a-z]{1,6}", any::<bool>(), 0..8),
        right in prop::collection::btree_map("[a-z]{1,6}", any::<bool>(), 0..8),
    ) {
        register_all();
        let mut a = sample_player();
        a.flags = left;
        let mut b = sample_player();
        b.flags = right;

        let patch = diff(&a, &b).unwrap();
        merge(&mut a, &patch, &MergeOptions::default()).unwrap();
        prop_assert!(structural_eq(&a, &b).unwrap());
    }

    #[test]
    fn grid_diff_converges(xs in grid_strategy(), ys in grid_strategy()) {
        register_all();
        let mut a = sample_player();
        a.grid = xs;
        let mut b = sample_player();
        b.grid = ys;

        let patch = diff(&a, &b).unwrap();
        merge(&mut a, &patch, &MergeOptions::default()).unwrap();
        prop_assert!(structural_eq(&a, &b).unwrap());
    }

    #[test]
    fn nested_map_diff_converges(left in rounds_strategy(), right in rounds_strategy()) {
        statewire_engine::register::<History>().unwrap();
        let mut a = History { rounds: left };
        let b = History { rounds: right };

        let patch = diff(&a, &b).unwrap();
        merge(&mut a, &patch, &MergeOptions::default()).unwrap();
        prop_assert!(structural_eq(&a, &b).unwrap());
    }

    #[test]
    fn whole_document_diff_converges(
        score in any::<i32>(),
        level in any::<u32>(),
        name in "[ -~]{0,24}",
    ) {
        register_all();
        let a = sample_player();
        let mut b = sample_player();
        b.score = score;
        b.champion.level = level;
        b.name = name;

        let patch = diff(&a, &b).unwrap();
        let mut target: Player = from_document(
            &serialize_to_string(&a).unwrap(),
            &DecodeOptions::strict(),
        ).unwrap();
        merge(&mut target, &patch, &MergeOptions::default()).unwrap();
        prop_assert!(structural_eq(&b, &target).unwrap());
    }
}
