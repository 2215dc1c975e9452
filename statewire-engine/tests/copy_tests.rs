mod common;

use pretty_assertions::assert_eq;

use common::{Buff, Poison, Stats, Unit, register_all, sample_player};
use statewire_engine::{Persistable, copy_from, deep_copy, diff, structural_eq};

#[test]
fn deep_copy_is_structurally_equal() {
    register_all();
    let original = sample_player();
    let copy = deep_copy(&original).unwrap();
    assert!(structural_eq(&original, &copy).unwrap());
    assert!(diff(&original, &copy).unwrap().is_empty());
}

#[test]
fn deep_copy_is_independent() {
    register_all();
    let original = sample_player();
    let mut copy = deep_copy(&original).unwrap();

    copy.champion.stats.hp = 1;
    copy.inventory.push(99);
    copy.flags.insert("extra".to_string(), true);

    assert_eq!(original.champion.stats.hp, 40);
    assert_eq!(original.inventory.len(), 5);
    assert!(!original.flags.contains_key("extra"));
    assert!(!structural_eq(&original, &copy).unwrap());
}

#[test]
fn structural_eq_sees_every_category() {
    register_all();
    let a = sample_player();

    let mut b = sample_player();
    b.grid[1][0] = Some(6);
    assert!(!structural_eq(&a, &b).unwrap());

    let mut c = sample_player();
    c.effects.get_mut_as::<Buff>(0).unwrap().strength = 4;
    assert!(!structural_eq(&a, &c).unwrap());

    let mut d = sample_player();
    d.position.y = 0;
    assert!(!structural_eq(&a, &d).unwrap());
}

#[test]
fn copy_from_makes_target_equal() {
    register_all();
    let source = sample_player();
    let mut target = statewire_engine::deep_copy(&source).unwrap();
    target.score = 0;
    target.inventory.clear();
    target.ally = None;

    copy_from(&mut target, &source, true).unwrap();
    assert!(structural_eq(&source, &target).unwrap());

    let mut rebuilt = common::Player::default();
    copy_from(&mut rebuilt, &source, false).unwrap();
    assert!(structural_eq(&source, &rebuilt).unwrap());
}

#[test]
fn dynamic_equality_is_type_aware() {
    register_all();
    let buff = Buff { strength: 2 };
    let poison = Poison { ticks: 2, damage: 2 };

    // Same field values, different concrete types.
    let a: &dyn Persistable = &buff;
    let b: &dyn Persistable = &poison;
    assert!(!a.eq_dyn(b).unwrap());
    assert!(a.eq_dyn(a).unwrap());
}

#[test]
fn dynamic_clone_preserves_concrete_type() {
    register_all();
    let poison = Poison { ticks: 9, damage: 3 };
    let cloned = poison.clone_dyn().unwrap();
    assert_eq!(cloned.type_name(), "Poison");

    let cloned = cloned.as_any().downcast_ref::<Poison>().unwrap();
    assert_eq!(cloned.ticks, 9);
    assert_eq!(cloned.damage, 3);
}

#[test]
fn copy_covers_inherited_fields() {
    register_all();
    let source = Unit {
        stats: Stats { hp: 77, mp: 8 },
        name: "Scout".to_string(),
        level: 2,
    };
    let copy = deep_copy(&source).unwrap();
    assert_eq!(copy.stats.hp, 77);
    assert_eq!(copy.stats.mp, 8);
    assert_eq!(copy.name, "Scout");
}
