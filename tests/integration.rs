//! Integration tests for the latent models.
//!
//! Tests the full pipeline: configuration -> construction -> training ->
//! scoring and link prediction.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use lattix_latent::{
    CorruptingSampler, EnsembleConfig, FactorConfig, FactorForm, GraphShape, ModelConfig,
    ScoringModel, ScriptedSampler, StepOutcome, TopicConfig, TopicMixtureModel,
    Trainer, TrainingConfig, TranslationalConfig, TranslationalModel, Triplet,
};
use ndarray::{array, Axis};

/// Three entities, one relation, two facts.
fn toy_graph() -> Vec<Triplet> {
    vec![Triplet::new(0, 0, 1), Triplet::new(1, 0, 2)]
}

/// A small chain with two relations.
fn chain_graph() -> Vec<Triplet> {
    vec![
        Triplet::new(0, 0, 1),
        Triplet::new(1, 0, 2),
        Triplet::new(2, 0, 3),
        Triplet::new(3, 0, 4),
        Triplet::new(1, 1, 0),
        Triplet::new(2, 1, 1),
        Triplet::new(4, 1, 3),
    ]
}

/// Fixed negatives: one head and one tail corruption per relation.
fn scripted_negatives() -> Vec<Triplet> {
    vec![
        Triplet::new(0, 0, 3),
        Triplet::new(4, 0, 2),
        Triplet::new(3, 1, 0),
        Triplet::new(1, 1, 4),
    ]
}

fn all_configs() -> Vec<ModelConfig> {
    vec![
        ModelConfig::Topic(TopicConfig::default().with_topics(3).with_seed(5)),
        ModelConfig::Translational(TranslationalConfig::default().with_dim(6).with_seed(5)),
        ModelConfig::Factor(FactorConfig::default().with_dim(6).with_seed(5)),
        ModelConfig::Factor(
            FactorConfig::default()
                .with_dim(6)
                .with_form(FactorForm::KullbackLeibler)
                .with_seed(5),
        ),
        ModelConfig::Ensemble(
            EnsembleConfig::default()
                .with_dim(6)
                .with_factors(3)
                .with_seed(5),
        ),
    ]
}

fn every_triplet(shape: GraphShape) -> impl Iterator<Item = Triplet> {
    (0..shape.num_relations).flat_map(move |r| {
        (0..shape.num_entities)
            .flat_map(move |h| (0..shape.num_entities).map(move |t| Triplet::new(h, r, t)))
    })
}

#[test]
fn test_toy_translational_reaches_margin() {
    let triplets = toy_graph();
    let shape = GraphShape::covering(&triplets);
    assert_eq!(shape, GraphShape::new(3, 1));

    let config = TranslationalConfig::default()
        .with_dim(2)
        .with_learning_rate(0.01)
        .with_margin(1.0);
    let mut model = TranslationalModel::from_tables(
        shape,
        &config,
        array![[-0.6, -0.6], [-0.6, 0.6], [0.6, 0.6]],
        array![[0.6, 0.8]],
        array![[1.0, 1.0]],
    )
    .unwrap();

    // (0,0,2) corrupts the tail of the first fact and the head of the second.
    let negative = Triplet::new(0, 0, 2);
    let mut sampler = ScriptedSampler::new(vec![negative]);
    let report = Trainer::new(TrainingConfig::default().with_epochs(100))
        .run(&mut model, &triplets, &mut sampler)
        .unwrap();

    assert_eq!(report.epochs.len(), 100);
    assert!(report.epochs[0].violations() > 0);
    assert_eq!(report.final_violations(), 0, "history: {:?}", report.violation_history());

    let negative_score = model.score(&negative).unwrap();
    for fact in &triplets {
        let gap = model.score(fact).unwrap() - negative_score;
        assert!(gap >= model.margin(), "{fact:?} beats its negative by only {gap}");
    }
}

#[test]
fn test_converged_epochs_leave_parameters_unchanged() {
    let triplets = toy_graph();
    let config = TranslationalConfig::default().with_dim(2).with_margin(1.0);
    let mut model = TranslationalModel::from_tables(
        GraphShape::new(3, 1),
        &config,
        array![[-0.6, -0.6], [-0.6, 0.6], [0.6, 0.6]],
        array![[0.6, 0.8]],
        array![[1.0, 1.0]],
    )
    .unwrap();
    let mut sampler = ScriptedSampler::new(vec![Triplet::new(0, 0, 2)]);
    let trainer = Trainer::new(TrainingConfig::default().with_epochs(100));
    trainer.run(&mut model, &triplets, &mut sampler).unwrap();

    let snapshot = model.clone();
    let report = trainer.run(&mut model, &triplets, &mut sampler).unwrap();
    assert!(report.epochs.iter().all(|e| e.updated == 0));
    for e in 0..3 {
        assert_eq!(
            model.entity_embedding(e).unwrap(),
            snapshot.entity_embedding(e).unwrap()
        );
    }
}

#[test]
fn test_training_is_deterministic_for_every_model() {
    let triplets = chain_graph();
    let shape = GraphShape::covering(&triplets);
    let trainer = Trainer::new(TrainingConfig::default().with_epochs(15));

    for config in all_configs() {
        let mut runs = Vec::new();
        for _ in 0..2 {
            let mut model = config.build(shape).unwrap();
            let mut sampler = ScriptedSampler::new(scripted_negatives());
            let report = trainer
                .run(model.as_mut(), &triplets, &mut sampler)
                .unwrap();
            let scores: Vec<f64> = every_triplet(shape)
                .map(|t| model.score(&t).unwrap())
                .collect();
            runs.push((report, scores));
        }
        assert_eq!(runs[0].0, runs[1].0, "{config:?}: reports differ");
        assert_eq!(runs[0].1, runs[1].1, "{config:?}: scores differ");
    }
}

#[test]
fn test_corrupting_sampler_is_reproducible() {
    let triplets = chain_graph();
    let shape = GraphShape::covering(&triplets);
    let config = ModelConfig::Factor(FactorConfig::default().with_dim(4).with_seed(9));
    let trainer = Trainer::new(TrainingConfig::default().with_epochs(10));

    let mut scores = Vec::new();
    for _ in 0..2 {
        let mut model = config.build(shape).unwrap();
        let mut sampler = CorruptingSampler::new(shape.num_entities, 17).with_known(&triplets);
        trainer
            .run(model.as_mut(), &triplets, &mut sampler)
            .unwrap();
        scores.push(
            every_triplet(shape)
                .map(|t| model.score(&t).unwrap())
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(scores[0], scores[1]);
}

#[test]
fn test_topic_model_em_protocol() {
    let triplets = chain_graph();
    let shape = GraphShape::covering(&triplets);
    let mut model = TopicMixtureModel::new(shape, &TopicConfig::default().with_topics(4)).unwrap();
    let mut sampler = ScriptedSampler::new(Vec::new());

    let report = Trainer::new(TrainingConfig::default().with_epochs(20))
        .run(&mut model, &triplets, &mut sampler)
        .unwrap();

    // EM never consults the sampler and never counts as a violation.
    assert_eq!(sampler.served(), 0);
    for epoch in &report.epochs {
        assert_eq!(epoch.accumulated, triplets.len());
        assert_eq!(epoch.updated + epoch.skipped, 0);
    }

    for table in [model.head_table(), model.tail_table()] {
        for column in table.axis_iter(Axis(2)) {
            assert!((column.sum() - 1.0).abs() < 1e-9);
        }
        assert!(table.iter().all(|&x| x > 0.0));
    }
    assert!((model.topic_prior().sum() - 1.0).abs() < 1e-9);

    // observed facts outrank unobserved ones for the same relation
    let observed = model.score(&Triplet::new(0, 0, 1)).unwrap();
    let unobserved = model.score(&Triplet::new(4, 0, 0)).unwrap();
    assert!(observed > unobserved, "{observed} <= {unobserved}");
}

#[test]
fn test_boxed_models_predict_links() {
    let triplets = chain_graph();
    let shape = GraphShape::covering(&triplets);
    let trainer = Trainer::new(TrainingConfig::default().with_epochs(5));

    for config in all_configs() {
        let mut model = config.build(shape).unwrap();
        let mut sampler = CorruptingSampler::new(shape.num_entities, 3).with_known(&triplets);
        trainer
            .run(model.as_mut(), &triplets, &mut sampler)
            .unwrap();

        let tails = model.predict_tail(0, 0, 3).unwrap();
        assert_eq!(tails.len(), 3);
        assert!(tails.windows(2).all(|w| w[0].score >= w[1].score));

        let heads = model.predict_head(1, 0, 10).unwrap();
        assert_eq!(heads.len(), shape.num_entities);

        assert!(model.score(&Triplet::new(0, 2, 1)).is_err());
        assert!(model.predict_tail(9, 0, 1).is_err());
    }
}

#[test]
fn test_sampler_errors_abort_training() {
    let triplets = chain_graph();
    let shape = GraphShape::covering(&triplets);
    let mut model = ModelConfig::Translational(TranslationalConfig::default().with_dim(3))
        .build(shape)
        .unwrap();

    let mut calls = 0;
    let mut failing = |t: &Triplet| -> lattix_latent::Result<Triplet> {
        calls += 1;
        if calls > 3 {
            Err(lattix_latent::Error::Sampler("exhausted".into()))
        } else {
            Ok(t.with_tail((t.tail + 1) % 5))
        }
    };
    let result = Trainer::new(TrainingConfig::default().with_epochs(2)).run(
        model.as_mut(),
        &triplets,
        &mut failing,
    );
    assert!(matches!(result, Err(lattix_latent::Error::Sampler(_))));
}

#[test]
fn test_single_steps_report_outcomes() {
    let triplets = toy_graph();
    let shape = GraphShape::covering(&triplets);
    let mut sampler = ScriptedSampler::new(vec![Triplet::new(0, 0, 2)]);

    let mut topic = TopicMixtureModel::new(shape, &TopicConfig::default().with_topics(2)).unwrap();
    topic.begin_epoch();
    assert_eq!(
        topic.train_on_triplet(&triplets[0], &mut sampler).unwrap(),
        StepOutcome::Accumulated
    );

    // an unreachable margin forces an update
    let mut translational = TranslationalModel::new(
        shape,
        &TranslationalConfig::default().with_dim(2).with_margin(100.0),
    )
    .unwrap();
    assert_eq!(
        translational
            .train_on_triplet(&triplets[0], &mut sampler)
            .unwrap(),
        StepOutcome::Updated
    );
}
