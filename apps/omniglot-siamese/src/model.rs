use tch::{
    nn::{self, Module},
    Tensor,
};
use tracing::{debug, info, trace};

use crate::{
    config::NetworkConfig,
    distance::DistanceKind,
    encoder::{Encoder, EMBEDDING_DIM},
    error::{Result, SiameseError},
    summary::{LayerSummary, ModelSummary},
};

/// Siamese neural network for few-shot learning.
#[derive(Debug)]
pub struct SiameseNetwork {
    encoder: Encoder,
    distance: DistanceKind,
    prediction: nn::Linear,
    config: NetworkConfig,
}

impl SiameseNetwork {
    pub fn new(vs: &nn::Path, config: NetworkConfig) -> Result<Self> {
        config.validate()?;

        let encoder = Encoder::new(&(vs / "encoder"), config.input_shape)?;
        let prediction = nn::linear(
            vs / "prediction",
            EMBEDDING_DIM,
            config.num_classes,
            Default::default(),
        );

        let network = Self {
            encoder,
            distance: config.distance,
            prediction,
            config,
        };
        info!(
            "Built Siamese network: input {}, {} output(s), {:?} distance, {} parameters",
            network.config.input_shape,
            network.config.num_classes,
            network.distance,
            network.param_count()
        );
        Ok(network)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn embed(&self, images: &Tensor) -> Result<Tensor> {
        self.encoder.forward(images)
    }

    pub fn distance(&self, first: &Tensor, second: &Tensor) -> Result<Tensor> {
        let first = self.embed(first)?;
        let second = self.embed(second)?;
        trace!("embeddings: {:?} / {:?}", first.size(), second.size());
        self.distance.apply(&first, &second)
    }

    pub fn predict(&self, distance: &Tensor) -> Tensor {
        self.prediction.forward(distance).sigmoid()
    }

    /// Similarity prediction `[N, num_classes]` for an (anchor, candidate) pair.
    pub fn forward(&self, first: &Tensor, second: &Tensor) -> Result<Tensor> {
        let distance = self.distance(first, second)?;
        let pred = self.predict(&distance);
        debug!("prediction shape {:?}", pred.size());
        Ok(pred)
    }

    pub fn forward_pair(&self, inputs: &[Tensor]) -> Result<Tensor> {
        match inputs {
            [first, second] => self.forward(first, second),
            _ => Err(SiameseError::PairArity(inputs.len())),
        }
    }

    fn prediction_params(&self) -> i64 {
        (EMBEDDING_DIM + 1) * self.config.num_classes
    }

    pub fn param_count(&self) -> i64 {
        self.encoder.param_count() + self.prediction_params()
    }

    pub fn summary(&self) -> ModelSummary {
        let mut layers: Vec<LayerSummary> = self
            .encoder
            .stages()
            .iter()
            .map(|s| LayerSummary {
                name: format!("encoder/{}", s.name),
                output_shape: s.output_shape.clone(),
                params: s.params,
            })
            .collect();
        layers.push(LayerSummary {
            name: self.distance.name().to_string(),
            output_shape: vec![EMBEDDING_DIM],
            params: 0,
        });
        layers.push(LayerSummary {
            name: "prediction".to_string(),
            output_shape: vec![self.config.num_classes],
            params: self.prediction_params(),
        });
        ModelSummary::new(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputShape;
    use tch::{Device, Kind};

    fn network(config: NetworkConfig) -> (nn::VarStore, SiameseNetwork) {
        let vs = nn::VarStore::new(Device::Cpu);
        let net = SiameseNetwork::new(&vs.root(), config).unwrap();
        (vs, net)
    }

    #[test]
    fn one_parameter_set_backs_both_towers() {
        let (vs, net) = network(NetworkConfig::default());
        // four convolutions and the embedding layer, plus the prediction layer
        assert_eq!(vs.trainable_variables().len(), 12);
        let numel: usize = vs.trainable_variables().iter().map(|t| t.numel()).sum();
        assert_eq!(numel as i64, net.param_count());
        assert_eq!(net.param_count(), 10_640_193);
    }

    #[test]
    fn variables_are_named_by_stage() {
        let (vs, _net) = network(NetworkConfig::default());
        let variables = vs.variables();
        for name in [
            "encoder.conv1.weight",
            "encoder.conv4.bias",
            "encoder.dense.weight",
            "prediction.weight",
            "prediction.bias",
        ] {
            assert!(variables.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let vs = nn::VarStore::new(Device::Cpu);
        let config = NetworkConfig::default().with_num_classes(0);
        assert!(matches!(
            SiameseNetwork::new(&vs.root(), config),
            Err(SiameseError::InvalidNumClasses(0))
        ));

        let config = NetworkConfig::default().with_input_shape(InputShape::new(20, 20, 1));
        assert!(matches!(
            SiameseNetwork::new(&vs.root(), config),
            Err(SiameseError::DegenerateShape { .. })
        ));
    }

    #[test]
    fn forward_pair_requires_exactly_two_inputs() {
        let (_vs, net) = network(NetworkConfig::default());
        let image = Tensor::zeros([1, 1, 105, 105], (Kind::Float, Device::Cpu));
        let inputs = [image.shallow_clone(), image.shallow_clone(), image];
        assert!(matches!(
            net.forward_pair(&inputs),
            Err(SiameseError::PairArity(3))
        ));
        assert!(matches!(
            net.forward_pair(&inputs[..1]),
            Err(SiameseError::PairArity(1))
        ));
    }

    #[test]
    fn summary_lists_every_stage() {
        let (_vs, net) = network(NetworkConfig::default().with_num_classes(5));
        let summary = net.summary();
        assert_eq!(summary.layers().len(), 12);
        assert_eq!(summary.layers()[10].name, "l1_distance");
        assert_eq!(summary.layers()[11].output_shape, vec![5]);
        assert_eq!(summary.total_params(), net.param_count());
    }
}
