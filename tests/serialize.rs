use facet::Facet;
use facet_convert::{ConvertedMap, Value};

/// The canonical shape: keys in declaration order, strings quoted, numbers
/// bare.
#[test]
fn basic_shape() {
    #[derive(Facet)]
    struct Person {
        name: String,
        age: u32,
    }

    let person = Person {
        name: "John".to_string(),
        age: 30,
    };

    let text = facet_convert::from(&person).to_map().to_text();
    assert_eq!(text, r#"{"name":"John","age":30}"#);
}

/// Scalar rendering rules: null bare, booleans bare, signed and floating
/// values in their literal form, characters quoted.
#[test]
fn scalar_rendering() {
    let map = ConvertedMap::new()
        .put_over("missing", Value::Null)
        .put_over("flag", Value::Bool(false))
        .put_over("delta", Value::I64(-4))
        .put_over("ratio", Value::F64(2.5))
        .put_over("grade", Value::Char('A'));

    assert_eq!(
        map.to_text(),
        r#"{"missing":null,"flag":false,"delta":-4,"ratio":2.5,"grade":"A"}"#
    );
}

/// Sequences render as arrays, element by element.
#[test]
fn sequence_rendering() {
    #[derive(Facet)]
    struct Tagged {
        tags: Vec<String>,
        counts: Vec<u32>,
    }

    let tagged = Tagged {
        tags: vec!["a".to_string(), "b".to_string()],
        counts: vec![1, 2, 3],
    };

    let text = facet_convert::from(&tagged).to_map().to_text();
    assert_eq!(text, r#"{"tags":["a","b"],"counts":[1,2,3]}"#);
}

/// Nested records render as nested objects.
#[test]
fn nested_rendering() {
    #[derive(Facet)]
    struct Address {
        city: String,
        zip: u32,
    }

    #[derive(Facet)]
    struct Person {
        name: String,
        address: Address,
    }

    let person = Person {
        name: "John".to_string(),
        address: Address {
            city: "Busan".to_string(),
            zip: 48060,
        },
    };

    let text = facet_convert::from(&person).to_map().to_text();
    assert_eq!(text, r#"{"name":"John","address":{"city":"Busan","zip":48060}}"#);
}

/// A sequence of records renders as an array of objects.
#[test]
fn sequence_of_records() {
    #[derive(Facet)]
    struct Item {
        id: u32,
    }

    #[derive(Facet)]
    struct Cart {
        items: Vec<Item>,
    }

    let cart = Cart {
        items: vec![Item { id: 1 }, Item { id: 2 }],
    };

    let text = facet_convert::from(&cart).to_map().to_text();
    assert_eq!(text, r#"{"items":[{"id":1},{"id":2}]}"#);
}

/// No escaping is performed: quotes inside values pass through verbatim.
/// This is the documented limitation of the emitter.
#[test]
fn no_escaping() {
    let map = ConvertedMap::new().put_over("quote", r#"say "hi""#.into());
    assert_eq!(map.to_text(), r#"{"quote":"say "hi""}"#);
}

/// An empty container renders as an empty object.
#[test]
fn empty_container() {
    assert_eq!(ConvertedMap::new().to_text(), "{}");
}
