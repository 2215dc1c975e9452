use std::collections::BTreeMap;
use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use statewire_engine::{
    Codec, DecodeOptions, MergeOptions, Persist, TypeBuilder, deep_copy, deserialize_from_str,
    diff, merge, register, serialize_to_string,
};

#[derive(Default)]
struct Creature {
    hp: i32,
    speed: i32,
    name: String,
}

impl Persist for Creature {
    const TYPE_NAME: &'static str = "Creature";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("hp", Codec::<i32>::scalar(), |c| &c.hp, |c| &mut c.hp)
            .field("speed", Codec::<i32>::scalar(), |c| &c.speed, |c| &mut c.speed)
            .field("name", Codec::string(), |c| &c.name, |c| &mut c.name);
    }
}

#[derive(Default)]
struct Board {
    round: u32,
    title: String,
    hero: Creature,
    scores: Vec<i32>,
    flags: BTreeMap<String, bool>,
}

impl Persist for Board {
    const TYPE_NAME: &'static str = "Board";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("round", Codec::<u32>::scalar(), |x| &x.round, |x| &mut x.round)
            .field("title", Codec::string(), |x| &x.title, |x| &mut x.title)
            .field("hero", Codec::<Creature>::nested(), |x| &x.hero, |x| &mut x.hero)
            .field(
                "scores",
                Codec::array(Codec::<i32>::scalar()),
                |x| &x.scores,
                |x| &mut x.scores,
            )
            .field(
                "flags",
                Codec::map(Codec::<bool>::scalar()),
                |x| &x.flags,
                |x| &mut x.flags,
            );
    }
}

fn sample_board() -> Board {
    Board {
        round: 12,
        title: "ranked ladder, best of three".to_string(),
        hero: Creature {
            hp: 40,
            speed: 7,
            name: "Vanguard".to_string(),
        },
        scores: (0..64).collect(),
        flags: (0..16)
            .map(|i| (format!("flag{i}"), i % 2 == 0))
            .collect(),
    }
}

fn setup() {
    register::<Creature>().expect("register Creature");
    register::<Board>().expect("register Board");
}

fn bench_serialize(c: &mut Criterion) {
    setup();
    let board = sample_board();
    c.bench_function("serialize_board", |b| {
        b.iter(|| serialize_to_string(black_box(&board)).unwrap());
    });
}

fn bench_deserialize(c: &mut Criterion) {
    setup();
    let text = serialize_to_string(&sample_board()).unwrap();
    let opts = DecodeOptions::default();
    c.bench_function("deserialize_board", |b| {
        b.iter(|| {
            let mut board = Board::default();
            deserialize_from_str(&mut board, black_box(&text), &opts).unwrap();
            board
        });
    });
}

fn bench_diff(c: &mut Criterion) {
    setup();
    let a = sample_board();
    let mut b = sample_board();
    b.round = 13;
    b.scores[40] = -1;
    b.hero.hp = 38;
    c.bench_function("diff_board", |bench| {
        bench.iter(|| diff(black_box(&a), black_box(&b)).unwrap());
    });
}

fn bench_merge(c: &mut Criterion) {
    setup();
    let a = sample_board();
    let mut b = sample_board();
    b.round = 13;
    b.scores[40] = -1;
    b.hero.hp = 38;
    let patch = diff(&a, &b).unwrap();
    let opts = MergeOptions::default();
    c.bench_function("merge_board", |bench| {
        bench.iter(|| {
            let mut target = sample_board();
            merge(&mut target, black_box(&patch), &opts).unwrap();
            target
        });
    });
}

fn bench_deep_copy(c: &mut Criterion) {
    setup();
    let board = sample_board();
    c.bench_function("deep_copy_board", |b| {
        b.iter(|| deep_copy(black_box(&board)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_serialize,
    bench_deserialize,
    bench_diff,
    bench_merge,
    bench_deep_copy
);
criterion_main!(benches);
