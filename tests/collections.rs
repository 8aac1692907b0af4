use std::collections::{HashMap, HashSet};

use facet::Facet;

/// Sequence fields convert element by element into a fresh container.
#[test]
fn vec_of_records() {
    #[derive(Facet)]
    struct ProductEntity {
        product_id: String,
        product_name: String,
        price: f64,
    }

    #[derive(Facet)]
    struct CategoryEntity {
        name: String,
        products: Vec<ProductEntity>,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct ProductDto {
        product_name: String,
        price: f64,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct CategoryDto {
        name: String,
        products: Vec<ProductDto>,
    }

    let category = CategoryEntity {
        name: "Electronics".to_string(),
        products: vec![
            ProductEntity {
                product_id: "P001".to_string(),
                product_name: "Mouse".to_string(),
                price: 20.0,
            },
            ProductEntity {
                product_id: "P002".to_string(),
                product_name: "Keyboard".to_string(),
                price: 50.0,
            },
        ],
    };

    let dto: CategoryDto = facet_convert::from(&category).to().unwrap();
    assert_eq!(dto.name, "Electronics");
    assert_eq!(dto.products.len(), 2);
    assert_eq!(dto.products[0].product_name, "Mouse");
    assert_eq!(dto.products[1].product_name, "Keyboard");
}

/// Mutating a converted sequence never affects the source sequence.
#[test]
fn deep_copy_independence() {
    #[derive(Facet, Debug, PartialEq)]
    struct TagSet {
        tags: Vec<String>,
    }

    let source = TagSet {
        tags: vec!["tag1".to_string(), "tag2".to_string()],
    };

    let mut converted: TagSet = facet_convert::from(&source).to().unwrap();
    converted.tags.push("tag3".to_string());
    converted.tags[0] = "changed".to_string();

    assert_eq!(source.tags, vec!["tag1".to_string(), "tag2".to_string()]);
    assert_eq!(converted.tags.len(), 3);
}

/// Map fields deep-convert their values.
#[test]
fn map_of_records() {
    #[derive(Facet)]
    struct ScoreEntity {
        points: u32,
        rank: u32,
    }

    #[derive(Facet)]
    struct Board {
        scores: HashMap<String, ScoreEntity>,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct ScoreDto {
        points: u32,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct BoardDto {
        scores: HashMap<String, ScoreDto>,
    }

    let mut scores = HashMap::new();
    scores.insert(
        "alice".to_string(),
        ScoreEntity {
            points: 120,
            rank: 1,
        },
    );
    scores.insert(
        "bob".to_string(),
        ScoreEntity {
            points: 80,
            rank: 2,
        },
    );

    let board = Board { scores };
    let dto: BoardDto = facet_convert::from(&board).to().unwrap();
    assert_eq!(dto.scores.len(), 2);
    assert_eq!(dto.scores["alice"], ScoreDto { points: 120 });
    assert_eq!(dto.scores["bob"], ScoreDto { points: 80 });
}

/// Scalar maps copy entry by entry.
#[test]
fn scalar_map_field() {
    #[derive(Facet)]
    struct Source {
        metadata: HashMap<String, String>,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Target {
        metadata: HashMap<String, String>,
    }

    let mut metadata = HashMap::new();
    metadata.insert("created".to_string(), "2023-01-01".to_string());
    metadata.insert("author".to_string(), "admin".to_string());

    let source = Source { metadata };
    let target: Target = facet_convert::from(&source).to().unwrap();
    assert_eq!(target.metadata["created"], "2023-01-01");
    assert_eq!(target.metadata["author"], "admin");
}

/// Set fields rebuild into fresh sets.
#[test]
fn set_field() {
    #[derive(Facet)]
    struct Source {
        labels: HashSet<String>,
    }

    #[derive(Facet, Debug)]
    struct Target {
        labels: HashSet<String>,
    }

    let mut labels = HashSet::new();
    labels.insert("alpha".to_string());
    labels.insert("beta".to_string());

    let source = Source { labels };
    let target: Target = facet_convert::from(&source).to().unwrap();
    assert_eq!(target.labels.len(), 2);
    assert!(target.labels.contains("alpha"));
    assert!(target.labels.contains("beta"));
}

/// Fixed-size array fields convert when the lengths line up, and skip
/// otherwise.
#[test]
fn array_field() {
    #[derive(Facet)]
    struct Source {
        rgb: [u8; 3],
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Target {
        rgb: [u8; 3],
    }

    let source = Source { rgb: [10, 20, 30] };
    let target: Target = facet_convert::from(&source).to().unwrap();
    assert_eq!(target.rgb, [10, 20, 30]);

    #[derive(Facet, Debug, PartialEq)]
    struct Wider {
        rgb: Option<[u8; 4]>,
    }

    // Length mismatch: the field is skipped and left at its default.
    let wider: Wider = facet_convert::from(&source).to().unwrap();
    assert_eq!(wider.rgb, None);
}

/// A sequence of sequences converts depth-first.
#[test]
fn nested_sequences() {
    #[derive(Facet)]
    struct Grid {
        rows: Vec<Vec<u32>>,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct GridDto {
        rows: Vec<Vec<u32>>,
    }

    let grid = Grid {
        rows: vec![vec![1, 2], vec![3, 4, 5]],
    };

    let dto: GridDto = facet_convert::from(&grid).to().unwrap();
    assert_eq!(dto.rows, vec![vec![1, 2], vec![3, 4, 5]]);
}
