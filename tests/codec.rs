use std::sync::Arc;

use facet::Facet;
use facet_convert::{ConvertError, FallbackCodec, Partial, Shape, Value};

/// Numeric values cross widths and signedness as long as no information is
/// lost.
#[test]
fn numeric_coercion() {
    #[derive(Facet)]
    struct Source {
        small: u8,
        big: u64,
        signed: i64,
        float: f64,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Target {
        small: i32,
        big: i64,
        signed: f64,
        float: f32,
    }

    let source = Source {
        small: 200,
        big: 300_000,
        signed: -12,
        float: 2.5,
    };

    let target: Target = facet_convert::from(&source).to().unwrap();
    assert_eq!(
        target,
        Target {
            small: 200,
            big: 300_000,
            signed: -12.0,
            float: 2.5,
        }
    );
}

/// Lossy conversions are rejected and the field stays at its default.
#[test]
fn lossy_coercion_skips_field() {
    #[derive(Facet)]
    struct Source {
        wide: u32,
        fractional: f64,
        negative: i32,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Target {
        wide: u8,
        fractional: u32,
        negative: u16,
    }

    let source = Source {
        wide: 70_000,
        fractional: 2.5,
        negative: -3,
    };

    let target: Target = facet_convert::from(&source).to().unwrap();
    assert_eq!(
        target,
        Target {
            wide: 0,
            fractional: 0,
            negative: 0,
        }
    );
}

/// String values parse into numeric targets; unparseable text skips.
#[test]
fn string_parses_into_scalar() {
    #[derive(Facet)]
    struct Source {
        port: String,
        broken: String,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Target {
        port: u16,
        broken: u16,
    }

    let source = Source {
        port: "8080".to_string(),
        broken: "not a number".to_string(),
    };

    let target: Target = facet_convert::from(&source).to().unwrap();
    assert_eq!(target.port, 8080);
    assert_eq!(target.broken, 0);
}

/// Scalars render into String targets.
#[test]
fn scalar_renders_into_string() {
    #[derive(Facet)]
    struct Source {
        age: u32,
        active: bool,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Target {
        age: String,
        active: String,
    }

    let source = Source {
        age: 30,
        active: true,
    };

    let target: Target = facet_convert::from(&source).to().unwrap();
    assert_eq!(target.age, "30");
    assert_eq!(target.active, "true");
}

/// Unit enum variants convert from their name.
#[test]
fn string_selects_enum_variant() {
    #[derive(Facet)]
    struct Source {
        status: String,
    }

    #[derive(Facet, Debug, PartialEq)]
    #[repr(u8)]
    enum Status {
        Active,
        Inactive,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Target {
        status: Option<Status>,
    }

    let source = Source {
        status: "Active".to_string(),
    };
    let target: Target = facet_convert::from(&source).to().unwrap();
    assert_eq!(target.status, Some(Status::Active));

    let source = Source {
        status: "Retired".to_string(),
    };
    let target: Target = facet_convert::from(&source).to().unwrap();
    assert_eq!(target.status, None);
}

/// Unit enum variants flatten to their name on the way out.
#[test]
fn enum_variant_extracts_as_name() {
    #[derive(Facet, Debug, PartialEq)]
    #[repr(u8)]
    enum Status {
        Active,
        Inactive,
    }

    #[derive(Facet)]
    struct Source {
        status: Status,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Target {
        status: String,
    }

    let source = Source {
        status: Status::Inactive,
    };
    let target: Target = facet_convert::from(&source).to().unwrap();
    assert_eq!(target.status, "Inactive");
}

/// A custom codec takes over every value/target pair the engine does not
/// handle natively.
#[test]
fn custom_codec() {
    struct YesNoCodec;

    impl FallbackCodec for YesNoCodec {
        fn can_convert(&self, value: &Value, target: &'static Shape) -> bool {
            (matches!(value, Value::Bool(_)) && target.is_type::<String>())
                || facet_convert::ScalarCodec.can_convert(value, target)
        }

        fn convert(&self, value: &Value, wip: &mut Partial<'_>) -> Result<(), ConvertError> {
            if wip.shape().is_type::<String>() {
                match value {
                    Value::Bool(true) => {
                        wip.set("yes".to_string())?;
                        return Ok(());
                    }
                    Value::Bool(false) => {
                        wip.set("no".to_string())?;
                        return Ok(());
                    }
                    _ => {}
                }
            }
            facet_convert::ScalarCodec.convert(value, wip)
        }
    }

    #[derive(Facet)]
    struct Source {
        active: bool,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Target {
        active: String,
    }

    let source = Source { active: true };
    let target: Target = facet_convert::from(&source)
        .with_codec(Arc::new(YesNoCodec))
        .to()
        .unwrap();
    assert_eq!(target.active, "yes");
}
