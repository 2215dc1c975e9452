mod common;

use pretty_assertions::assert_eq;

use common::{Stats, register_all};
use statewire_engine::{
    Codec, ConfigError, EncodeError, Persist, TypeBuilder, is_registered, register,
    serialize_to_string,
};

#[test]
fn registration_is_idempotent() {
    register_all();
    register::<Stats>().unwrap();
    register::<Stats>().unwrap();
    assert!(is_registered::<Stats>());
}

#[derive(Default)]
struct Unregistered {
    n: i32,
}

impl Persist for Unregistered {
    const TYPE_NAME: &'static str = "Unregistered";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("n", Codec::<i32>::scalar(), |x| &x.n, |x| &mut x.n);
    }
}

#[test]
fn operations_on_unregistered_types_fail() {
    assert!(!is_registered::<Unregistered>());
    let err = serialize_to_string(&Unregistered::default()).unwrap_err();
    assert!(
        matches!(
            err,
            EncodeError::Config(ConfigError::NotRegistered { type_name: "Unregistered" })
        ),
        "{err}"
    );
}

#[derive(Default)]
struct Doubled {
    n: i32,
}

impl Persist for Doubled {
    const TYPE_NAME: &'static str = "Doubled";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("n", Codec::<i32>::scalar(), |x| &x.n, |x| &mut x.n)
            .field("n", Codec::<i32>::scalar(), |x| &x.n, |x| &mut x.n);
    }
}

#[test]
fn duplicate_field_names_are_rejected() {
    let err = register::<Doubled>().unwrap_err();
    assert!(
        matches!(err, ConfigError::DuplicateField { field: "n", .. }),
        "{err}"
    );
}

#[derive(Default)]
struct FirstClaim {
    n: i32,
}

#[derive(Default)]
struct SecondClaim {
    n: i32,
}

impl Persist for FirstClaim {
    const TYPE_NAME: &'static str = "ClaimedName";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("n", Codec::<i32>::scalar(), |x| &x.n, |x| &mut x.n);
    }
}

impl Persist for SecondClaim {
    const TYPE_NAME: &'static str = "ClaimedName";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("n", Codec::<i32>::scalar(), |x| &x.n, |x| &mut x.n);
    }
}

#[test]
fn conflicting_type_names_are_rejected() {
    register::<FirstClaim>().unwrap();
    let err = register::<SecondClaim>().unwrap_err();
    assert!(
        matches!(err, ConfigError::DuplicateTypeName { type_name: "ClaimedName" }),
        "{err}"
    );
}

#[derive(Default)]
struct BadOmission {
    n: i32,
}

impl Persist for BadOmission {
    const TYPE_NAME: &'static str = "BadOmission";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("n", Codec::<i32>::scalar(), |x| &x.n, |x| &mut x.n)
            .omit("misspelled");
    }
}

#[test]
fn omitting_an_unknown_field_is_rejected() {
    let err = register::<BadOmission>().unwrap_err();
    assert!(
        matches!(
            err,
            ConfigError::UnknownField { field: "misspelled", .. }
        ),
        "{err}"
    );
}

#[derive(Default)]
struct SlimUnit {
    stats: Stats,
    level: u32,
}

impl Persist for SlimUnit {
    const TYPE_NAME: &'static str = "SlimUnit";

    fn schema(b: &mut TypeBuilder<Self>) {
        b.base(|u| &u.stats, |u| &mut u.stats)
            .field("level", Codec::<u32>::scalar(), |u| &u.level, |u| &mut u.level)
            .omit("mp");
    }
}

#[test]
fn inherited_fields_can_be_omitted() {
    register_all();
    register::<SlimUnit>().unwrap();
    let unit = SlimUnit {
        stats: Stats { hp: 3, mp: 4 },
        level: 1,
    };
    assert_eq!(serialize_to_string(&unit).unwrap(), "hp=3\nlevel=1\n");
}

#[derive(Default)]
struct Shuffled {
    zeta: i32,
    alpha: i32,
    title: String,
}

impl Persist for Shuffled {
    const TYPE_NAME: &'static str = "Shuffled";

    // Declared out of order on purpose; the wire order must not care.
    fn schema(b: &mut TypeBuilder<Self>) {
        b.field("title", Codec::string(), |x| &x.title, |x| &mut x.title)
            .field("zeta", Codec::<i32>::scalar(), |x| &x.zeta, |x| &mut x.zeta)
            .field("alpha", Codec::<i32>::scalar(), |x| &x.alpha, |x| &mut x.alpha);
    }
}

#[test]
fn wire_order_is_canonical_not_declaration_order() {
    register::<Shuffled>().unwrap();
    let value = Shuffled {
        zeta: 1,
        alpha: 2,
        title: "t".to_string(),
    };
    assert_eq!(
        serialize_to_string(&value).unwrap(),
        "alpha=2\nzeta=1\ntitle=\"t\"\n"
    );
}
