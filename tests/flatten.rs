use facet::Facet;
use facet_convert::Value;

/// Fields of a `#[facet(flatten)]` member participate in conversion as if
/// declared on the outer type, after the outer type's own fields.
#[test]
fn flattened_source_fields() {
    #[derive(Facet)]
    struct Audit {
        created_by: String,
        version: u32,
    }

    #[derive(Facet)]
    struct Entity {
        name: String,
        #[facet(flatten)]
        audit: Audit,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct FlatDto {
        name: String,
        created_by: String,
        version: u32,
    }

    let entity = Entity {
        name: "widget".to_string(),
        audit: Audit {
            created_by: "admin".to_string(),
            version: 3,
        },
    };

    let dto: FlatDto = facet_convert::from(&entity).to().unwrap();
    assert_eq!(
        dto,
        FlatDto {
            name: "widget".to_string(),
            created_by: "admin".to_string(),
            version: 3,
        }
    );

    let map = facet_convert::from(&entity).to_map();
    let keys: Vec<&str> = map.keys().collect();
    assert_eq!(keys, vec!["name", "created_by", "version"]);
}

/// A flat source fills a target's flattened member field by field.
#[test]
fn flattened_target_fields() {
    #[derive(Facet)]
    struct FlatSource {
        name: String,
        created_by: String,
        version: u32,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct AuditDto {
        created_by: String,
        version: u32,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct NestedDto {
        name: String,
        #[facet(flatten)]
        audit: AuditDto,
    }

    let source = FlatSource {
        name: "widget".to_string(),
        created_by: "admin".to_string(),
        version: 3,
    };

    let dto: NestedDto = facet_convert::from(&source).to().unwrap();
    assert_eq!(dto.name, "widget");
    assert_eq!(dto.audit.created_by, "admin");
    assert_eq!(dto.audit.version, 3);
}

/// The outer type's field shadows a same-named field of a flattened member.
#[test]
fn outer_field_shadows_flattened() {
    #[derive(Facet)]
    struct Base {
        id: u64,
        tag: String,
    }

    #[derive(Facet)]
    struct Derived {
        tag: String,
        #[facet(flatten)]
        base: Base,
    }

    let derived = Derived {
        tag: "outer".to_string(),
        base: Base {
            id: 9,
            tag: "inner".to_string(),
        },
    };

    let map = facet_convert::from(&derived).to_map();
    let keys: Vec<&str> = map.keys().collect();
    assert_eq!(keys, vec!["tag", "id"]);
    assert_eq!(map.get("tag"), Some(&Value::Text("outer".to_string())));
    assert_eq!(map.get("id"), Some(&Value::U64(9)));
}
