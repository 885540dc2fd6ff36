use geotext::geometry::SENTINEL_DISTANCE;
use geotext::prelude::*;
use geotext::{
    CentroidStrategy, CombinedGrid, CoordError, GlobalStats, KdTreeGrid, RegionGeometry,
    UniformGrid, spheredist,
};
use std::rc::Rc;

fn counts(lex: &mut Lexicon, words: &[(&str, u32)]) -> WordCounts {
    words.iter().map(|&(w, c)| (lex.intern(w), c)).collect()
}

fn finished_global(docs: &[WordCounts]) -> GlobalStats {
    let mut global = GlobalStats::new();
    for counts in docs {
        global.note_counts(counts);
    }
    global.finish_global_distribution();
    global
}

#[test]
fn test_missing_coordinate_distance() {
    let austin = Coord::new(30.27, -97.74);
    assert_eq!(spheredist(None, Some(&austin)), SENTINEL_DISTANCE);
    assert_eq!(spheredist(Some(&austin), None), SENTINEL_DISTANCE);
    assert_eq!(spheredist(None, None), SENTINEL_DISTANCE);
    assert_eq!(spheredist(Some(&austin), Some(&austin)), 0.0);
}

#[test]
fn test_antipodal_distance_is_finite() {
    let miles = spheredist(Some(&Coord::new(0.0, 0.0)), Some(&Coord::new(0.0, -180.0)));
    assert!(miles.is_finite());
    assert!((miles - std::f64::consts::PI * 3963.191).abs() < 1e-6);
}

#[test]
fn test_coordinate_policies() {
    assert_eq!(
        Coord::with_policy(91.0, 0.0, CoordPolicy::Accept).unwrap().lat(),
        91.0
    );
    assert!(matches!(
        Coord::with_policy(91.0, 0.0, CoordPolicy::Validate),
        Err(CoordError::OutOfBounds { .. })
    ));
    assert!(matches!(
        Coord::validated(f64::NAN, 0.0),
        Err(CoordError::NotFinite { .. })
    ));

    let coerced = Coord::with_policy(-95.0, 540.0, CoordPolicy::Coerce).unwrap();
    assert_eq!(coerced.lat(), -90.0);
    assert_eq!(coerced.long(), -180.0);

    // Coordinate errors convert into the crate error.
    fn parse(lat: f64, long: f64) -> Result<Coord> {
        Ok(Coord::validated(lat, long)?)
    }
    assert!(matches!(parse(0.0, 200.0), Err(GeotextError::OutOfBounds(_))));
}

#[test]
fn test_invalid_config_rejected_by_builder() {
    let config = Config::default().with_region_size_degrees(-1.0);
    assert!(matches!(
        build_grid(&config),
        Err(GeotextError::InvalidConfig(_))
    ));
}

#[test]
fn test_tiny_region_size_rejected_by_builder() {
    let config = Config::default().with_region_size_degrees(1e-9);
    let err = build_grid(&config).err().unwrap();
    assert!(matches!(err, GeotextError::InvalidConfig(_)));
    assert!(err.to_string().contains("minimum"), "{}", err);
}

#[test]
fn test_empty_corpus() {
    let mut trainer = Trainer::new(build_grid(&Config::default()).unwrap());
    assert!(trainer.train(&[]).is_complete());
    let model = trainer.finish();
    assert_eq!(model.global.num_word_types(), 0);
    assert_eq!(model.grid.num_nonempty_cells(), 0);

    let mut lex = Lexicon::new();
    let query = Document::new("q", Some(Coord::new(10.0, 10.0)), counts(&mut lex, &[("alone", 1)]));
    let mut ranker = model.ranker(RankingStrategy::default());
    assert!(ranker.rank_document(&query).is_empty());

    let mut eval = GeolocationEval::new(3);
    assert!(eval.evaluate_document(&mut ranker, &query).is_none());
    let summary = eval.summary();
    assert_eq!(summary.count, 0);
    assert_eq!(summary.unpredicted, 1);
    assert_eq!(summary.accuracy_at_1, 0.0);
    assert_eq!(summary.mean_miles, 0.0);
}

#[test]
fn test_empty_kdtree() {
    let mut trainer = Trainer::new(build_grid(&Config::default().with_grid(
        GridConfig::Kdtree(KdTreeConfig::default().with_backoff(true)),
    ))
    .unwrap());
    trainer.train(&[]);
    let model = trainer.finish();
    // A lone root covering the globe, with nothing in it.
    assert_eq!(model.grid.total_num_cells(), 1);
    assert!(model.grid.find_best_cell_for_coord(&Coord::new(0.0, 0.0)).is_none());
}

#[test]
fn test_query_with_only_unknown_words() {
    let mut lex = Lexicon::new();
    let docs = vec![
        Rc::new(Document::new(
            "a",
            Some(Coord::new(1.5, 1.5)),
            counts(&mut lex, &[("harbor", 2), ("ship", 1)]),
        )),
        Rc::new(Document::new(
            "b",
            Some(Coord::new(5.5, 5.5)),
            counts(&mut lex, &[("field", 2), ("corn", 3)]),
        )),
    ];
    let mut trainer = Trainer::new(build_grid(&Config::default()).unwrap());
    trainer.train(&docs);
    let model = trainer.finish();

    let query = Document::new("q", None, counts(&mut lex, &[("volcano", 2)]));
    for strategy in [
        RankingStrategy::default(),
        RankingStrategy::KlDivergence {
            partial: false,
            symmetric: true,
        },
        RankingStrategy::CosineSimilarity {
            smoothed: true,
            partial: false,
        },
        RankingStrategy::NaiveBayes,
    ] {
        let mut ranker = model.ranker(strategy);
        let ranked = ranker.rank_document(&query);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.score.is_finite()), "{:?}", strategy);
    }
}

#[test]
fn test_documents_without_words_or_location() {
    let mut lex = Lexicon::new();
    let docs = vec![
        Rc::new(Document::new("silent", Some(Coord::new(2.5, 2.5)), WordCounts::default())),
        Rc::new(Document::new("lost", None, counts(&mut lex, &[("map", 1)]))),
        Rc::new(Document::new(
            "dev",
            Some(Coord::new(2.5, 2.5)),
            counts(&mut lex, &[("map", 4)]),
        )
        .with_split(DocumentSplit::Dev)),
    ];
    let mut trainer = Trainer::new(build_grid(&Config::default()).unwrap());
    trainer.train(&docs);
    let model = trainer.finish();

    // The unlocated training document still counts toward the corpus.
    assert_eq!(model.global.num_word_tokens(), 1.0);
    // The cell has documents but no words to rank with.
    assert_eq!(model.grid.num_nonempty_cells(), 1);
    assert_eq!(model.grid.iter_nonempty_cells(true).count(), 0);
    let cell = model.grid.find_best_cell_for_coord(&Coord::new(2.5, 2.5)).unwrap();
    assert_eq!(cell.num_docs_for_links(), 2);
    assert!(cell.language_model().is_empty());
}

#[test]
fn test_minimum_word_count_prunes_cells() {
    let mut lex = Lexicon::new();
    let docs = vec![Rc::new(Document::new(
        "a",
        Some(Coord::new(3.5, 3.5)),
        counts(&mut lex, &[("common", 5), ("rare", 1)]),
    ))];
    let config = Config::default().with_minimum_word_count(2);
    let mut trainer = Trainer::new(build_grid(&config).unwrap());
    trainer.train(&docs);
    let model = trainer.finish();
    let cell = model.grid.find_best_cell_for_coord(&Coord::new(3.5, 3.5)).unwrap();
    let rare = lex.get("rare").unwrap();
    let common = lex.get("common").unwrap();
    assert!(!cell.language_model().contains(rare));
    assert!(cell.language_model().contains(common));
    assert_eq!(cell.language_model().total_tokens(), 5.0);
}

#[test]
fn test_nearest_sub_grid_wins() {
    // A coarse grid listed first, a fine grid second. At the fine cell's
    // center the fine candidate is nearer, so it wins despite its order.
    let coarse = UniformGrid::new(RegionGeometry::new(10.0, 1), CentroidStrategy::Geometric);
    let fine = UniformGrid::new(RegionGeometry::new(1.0, 1), CentroidStrategy::Geometric);
    let mut grid = CombinedGrid::new(vec![Box::new(coarse), Box::new(fine)]);

    let mut lex = Lexicon::new();
    let doc = Rc::new(Document::new(
        "d",
        Some(Coord::new(0.5, 0.5)),
        counts(&mut lex, &[("reef", 1)]),
    ));
    let global = finished_global(&[doc.counts().clone()]);
    grid.begin_training_pass(1);
    grid.add_document_to_cell(&doc);
    grid.initialize_cells(&global);

    let query = Coord::new(0.5, 0.5);
    let best = grid.find_best_cell_for_coord(&query).unwrap();
    assert_eq!(best.centroid(), query);
    assert_eq!(best.id(), grid.grids()[1].find_best_cell_for_coord(&query).unwrap().id());

    // Where the fine grid has no cell, the coarse one answers.
    let query = Coord::new(5.0, 5.0);
    assert!(grid.grids()[1].find_best_cell_for_coord(&query).is_none());
    let best = grid.find_best_cell_for_coord(&query).unwrap();
    assert_eq!(best.centroid(), query);
    assert_eq!(best.id(), grid.grids()[0].find_best_cell_for_coord(&query).unwrap().id());
}

#[test]
fn test_cell_ids_are_distinct_across_grids() {
    let mut lex = Lexicon::new();
    let doc = Rc::new(Document::new(
        "d",
        Some(Coord::new(0.5, 0.5)),
        counts(&mut lex, &[("reef", 1)]),
    ));
    let global = finished_global(&[doc.counts().clone()]);
    let mut a = UniformGrid::new(RegionGeometry::new(1.0, 1), CentroidStrategy::Weighted);
    let mut b = UniformGrid::new(RegionGeometry::new(1.0, 1), CentroidStrategy::Weighted);
    for grid in [&mut a, &mut b] {
        grid.begin_training_pass(1);
        grid.add_document_to_cell(&doc);
        grid.initialize_cells(&global);
    }
    let query = Coord::new(0.5, 0.5);
    assert_ne!(
        a.find_best_cell_for_coord(&query).unwrap().id(),
        b.find_best_cell_for_coord(&query).unwrap().id()
    );
}

#[test]
#[should_panic(expected = "initialize_cells called more than once")]
fn test_kdtree_initialized_twice() {
    let global = finished_global(&[]);
    let mut grid = KdTreeGrid::new(KdTreeConfig::default(), CentroidStrategy::Weighted);
    grid.initialize_cells(&global);
    grid.initialize_cells(&global);
}

#[test]
#[should_panic(expected = "Ranking cells of an uninitialized grid")]
fn test_ranking_uninitialized_grid() {
    let global = finished_global(&[]);
    let grid = UniformGrid::new(RegionGeometry::new(1.0, 1), CentroidStrategy::Weighted);
    let _ = CellRanker::new(&grid, &global, RankingStrategy::default());
}

#[test]
#[should_panic(expected = "Trainer::train called more than once")]
fn test_train_twice() {
    let mut trainer = Trainer::new(build_grid(&Config::default()).unwrap());
    trainer.train(&[]);
    trainer.train(&[]);
}
