use crate::Args;
use crate::data::{ClassificationBatch, ClassificationBatcher};
use crate::dataset::{CLASSES, XrayLoader, prepare_resized_root};
use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::transform::ShuffledDataset;
use burn::data::dataset::vision::ImageFolderDataset;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::AdamWConfig;
use burn::prelude::{Backend, Config, Int, Module, Tensor};
use burn::record::CompactRecorder;
use burn::tensor::backend::AutodiffBackend;
use burn::train::metric::store::{Aggregate, Direction, Split};
use burn::train::metric::{AccuracyMetric, LossMetric};
use burn::train::{
    ClassificationOutput, LearnerBuilder, MetricEarlyStoppingStrategy, StoppingCondition,
    TrainOutput, TrainStep, ValidStep,
};
use radimm::cache::disk::DiskCacheConfig;
use radimm::models::xray::{XrayClassifier, XrayClassifierConfig};
use std::path::Path;
use std::time::Instant;

/// Learner host for the classifier.
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    pub classifier: XrayClassifier<B>,
}

impl<B: Backend> Model<B> {
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let logits = self.classifier.forward_logits(images);

        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets.clone());

        ClassificationOutput::new(loss, logits, targets)
    }
}

impl<B: AutodiffBackend> TrainStep<ClassificationBatch<B>, ClassificationOutput<B>> for Model<B> {
    fn step(
        &self,
        batch: ClassificationBatch<B>,
    ) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<ClassificationBatch<B>, ClassificationOutput<B>> for Model<B> {
    fn step(
        &self,
        batch: ClassificationBatch<B>,
    ) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

#[derive(Config)]
pub struct TrainingConfig {
    #[config(default = 5)]
    pub num_epochs: usize,

    #[config(default = 24)]
    pub batch_size: usize,

    #[config(default = 4)]
    pub num_workers: usize,

    #[config(default = 42)]
    pub seed: u64,

    #[config(default = 1e-3)]
    pub learning_rate: f64,

    #[config(default = 5e-5)]
    pub weight_decay: f32,

    #[config(default = 70)]
    pub train_percentage: u8,

    pub classifier: XrayClassifierConfig,
}

fn create_artifact_dir(artifact_dir: &str) {
    // Remove existing artifacts before to get an accurate learner summary
    std::fs::remove_dir_all(artifact_dir).ok();
    std::fs::create_dir_all(artifact_dir).ok();
}

pub fn train<B: AutodiffBackend>(
    args: &Args,
    device: &B::Device,
) -> anyhow::Result<()> {
    let artifact_dir: &str = args.artifact_dir.as_ref();
    create_artifact_dir(artifact_dir);

    // Config
    let arch = crate::parse_arch(&args.arch)?;

    let classifier_config = XrayClassifierConfig::new(arch)
        .with_num_classes(CLASSES.len())
        .with_trainable_tail(args.trainable_tail)
        .with_dropout(args.dropout);

    let config = TrainingConfig::new(classifier_config)
        .with_learning_rate(args.learning_rate)
        .with_num_epochs(args.num_epochs)
        .with_batch_size(args.batch_size)
        .with_seed(args.seed);

    let optimizer = AdamWConfig::new()
        .with_weight_decay(config.weight_decay)
        .init();

    config
        .save(format!("{artifact_dir}/config.json"))
        .expect("Config should be saved successfully");

    B::seed(config.seed);

    // Dataloaders
    let batcher_train = ClassificationBatcher::<B>::new(device.clone());
    let batcher_valid = ClassificationBatcher::<B::InnerBackend>::new(device.clone());

    let resized_root = Path::new(&args.resized_root);
    prepare_resized_root(Path::new(&args.data_root), resized_root)?;

    let (train, valid) = ImageFolderDataset::xray_train_val_split(
        resized_root,
        config.train_percentage,
        config.seed,
    )?;

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(ShuffledDataset::with_seed(train, config.seed));

    let dataloader_test = DataLoaderBuilder::new(batcher_valid)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(valid);

    // Model; weights load before the freeze window re-applies.
    let weights_path = config
        .classifier
        .arch
        .pretrained_weights()
        .fetch_weights(&DiskCacheConfig::default())?;

    let classifier: XrayClassifier<B> = config
        .classifier
        .init(device)
        .load_backbone_pytorch_weights(weights_path)?;

    let model = Model { classifier };

    // Learner config
    let learner = LearnerBuilder::new(artifact_dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .early_stopping(MetricEarlyStoppingStrategy::new(
            &LossMetric::<B>::new(),
            Aggregate::Mean,
            Direction::Lowest,
            Split::Valid,
            StoppingCondition::NoImprovementSince {
                n_epochs: args.patience,
            },
        ))
        .devices(vec![device.clone()])
        .num_epochs(config.num_epochs)
        .summary()
        .build(model, optimizer, config.learning_rate);

    // Training
    let now = Instant::now();
    let model_trained = learner.fit(dataloader_train, dataloader_test);
    let elapsed = now.elapsed().as_secs();
    println!("Training completed in {}m{}s", (elapsed / 60), elapsed % 60);

    model_trained
        .classifier
        .save_file(format!("{artifact_dir}/model"), &CompactRecorder::new())
        .expect("Trained model should be saved successfully");

    Ok(())
}
