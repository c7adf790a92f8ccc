use tch::{
    nn::{self, Module},
    Device, Kind, Tensor,
};
use tracing::debug;

use crate::{
    config::InputShape,
    error::{Result, SiameseError},
};

pub const EMBEDDING_DIM: i64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Conv { filters: i64, kernel: i64 },
    MaxPool { size: i64 },
    Flatten,
    Dense { units: i64 },
}

pub const ENCODER_STAGES: [Stage; 10] = [
    // 64@10x10
    Stage::Conv { filters: 64, kernel: 10 },
    Stage::MaxPool { size: 2 },
    // 128@7x7
    Stage::Conv { filters: 128, kernel: 7 },
    Stage::MaxPool { size: 2 },
    // 128@4x4
    Stage::Conv { filters: 128, kernel: 4 },
    Stage::MaxPool { size: 2 },
    // 256@4x4
    Stage::Conv { filters: 256, kernel: 4 },
    Stage::MaxPool { size: 2 },
    Stage::Flatten,
    Stage::Dense {
        units: EMBEDDING_DIM,
    },
];

impl Stage {
    /// `None` when the stage would leave an empty tensor.
    pub fn output_shape(&self, input: &[i64]) -> Option<Vec<i64>> {
        match (*self, input) {
            (Stage::Conv { filters, kernel }, &[_, h, w]) => {
                let (h, w) = (h - kernel + 1, w - kernel + 1);
                (h >= 1 && w >= 1).then(|| vec![filters, h, w])
            }
            (Stage::MaxPool { size }, &[c, h, w]) => {
                let (h, w) = (h / size, w / size);
                (h >= 1 && w >= 1).then(|| vec![c, h, w])
            }
            (Stage::Flatten, dims) if !dims.is_empty() => Some(vec![dims.iter().product()]),
            (Stage::Dense { units }, &[_]) => Some(vec![units]),
            _ => None,
        }
    }

    pub fn param_count(&self, input: &[i64]) -> i64 {
        match (*self, input) {
            (Stage::Conv { filters, kernel }, &[c, ..]) => filters * c * kernel * kernel + filters,
            (Stage::Dense { units }, &[features]) => features * units + units,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageShape {
    pub name: String,
    pub stage: Stage,
    pub output_shape: Vec<i64>,
    pub params: i64,
}

#[derive(Debug)]
pub struct Encoder {
    net: nn::Sequential,
    input_shape: InputShape,
    stages: Vec<StageShape>,
    device: Device,
}

impl Encoder {
    pub fn new(vs: &nn::Path, input_shape: InputShape) -> Result<Self> {
        if !input_shape.is_valid() {
            return Err(SiameseError::InvalidInputShape(input_shape));
        }

        let mut net = nn::seq();
        let mut shape = input_shape.chw().to_vec();
        let mut stages = Vec::with_capacity(ENCODER_STAGES.len());
        let (mut convs, mut pools) = (0, 0);

        for stage in ENCODER_STAGES {
            let name = match stage {
                Stage::Conv { .. } => {
                    convs += 1;
                    format!("conv{convs}")
                }
                Stage::MaxPool { .. } => {
                    pools += 1;
                    format!("pool{pools}")
                }
                Stage::Flatten => "flatten".to_string(),
                Stage::Dense { .. } => "dense".to_string(),
            };

            let output_shape =
                stage
                    .output_shape(&shape)
                    .ok_or_else(|| SiameseError::DegenerateShape {
                        stage: name.clone(),
                        input: input_shape,
                    })?;
            let params = stage.param_count(&shape);

            net = match stage {
                Stage::Conv { filters, kernel } => net
                    .add(nn::conv2d(
                        vs / name.as_str(),
                        shape[0],
                        filters,
                        kernel,
                        Default::default(),
                    ))
                    .add_fn(|x| x.relu()),
                Stage::MaxPool { size } => net.add_fn(move |x| x.max_pool2d_default(size)),
                Stage::Flatten => net.add_fn(|x| x.flatten(1, -1)),
                Stage::Dense { units } => net
                    .add(nn::linear(
                        vs / name.as_str(),
                        shape[0],
                        units,
                        Default::default(),
                    ))
                    .add_fn(|x| x.sigmoid()),
            };

            debug!("encoder stage {name}: {shape:?} -> {output_shape:?} ({params} params)");
            shape = output_shape.clone();
            stages.push(StageShape {
                name,
                stage,
                output_shape,
                params,
            });
        }

        Ok(Self {
            net,
            input_shape,
            stages,
            device: vs.device(),
        })
    }

    /// Encodes an image `[C, H, W]` or a batch `[N, C, H, W]` into `[N, 4096]`.
    pub fn forward(&self, images: &Tensor) -> Result<Tensor> {
        let batch = self.prepare(images)?;
        Ok(self.net.forward(&batch))
    }

    fn prepare(&self, images: &Tensor) -> Result<Tensor> {
        let actual = images.size();
        let expected = self.input_shape.chw();
        let batch = match actual.len() {
            3 if actual[..] == expected => images.unsqueeze(0),
            4 if actual[1..] == expected => images.shallow_clone(),
            _ => {
                return Err(SiameseError::ShapeMismatch {
                    stage: self.stages[0].name.clone(),
                    expected: expected.to_vec(),
                    actual,
                })
            }
        };
        Ok(batch.to_kind(Kind::Float).to_device(self.device))
    }

    pub fn input_shape(&self) -> InputShape {
        self.input_shape
    }

    pub fn stages(&self) -> &[StageShape] {
        &self.stages
    }

    pub fn param_count(&self) -> i64 {
        self.stages.iter().map(|s| s.params).sum()
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(shape: InputShape) -> Result<Encoder> {
        let vs = nn::VarStore::new(Device::Cpu);
        Encoder::new(&vs.root(), shape)
    }

    #[test]
    fn default_shapes_follow_the_layer_stack() {
        let encoder = build(InputShape::default()).unwrap();
        let shapes: Vec<_> = encoder
            .stages()
            .iter()
            .map(|s| (s.name.as_str(), s.output_shape.clone()))
            .collect();
        assert_eq!(
            shapes,
            vec![
                ("conv1", vec![64, 96, 96]),
                ("pool1", vec![64, 48, 48]),
                ("conv2", vec![128, 42, 42]),
                ("pool2", vec![128, 21, 21]),
                ("conv3", vec![128, 18, 18]),
                ("pool3", vec![128, 9, 9]),
                ("conv4", vec![256, 6, 6]),
                ("pool4", vec![256, 3, 3]),
                ("flatten", vec![2304]),
                ("dense", vec![EMBEDDING_DIM]),
            ]
        );
    }

    #[test]
    fn parameter_counts() {
        let encoder = build(InputShape::default()).unwrap();
        let params: Vec<_> = encoder.stages().iter().map(|s| s.params).collect();
        assert_eq!(
            params,
            vec![6_464, 0, 401_536, 0, 262_272, 0, 524_544, 0, 0, 9_441_280]
        );
        assert_eq!(encoder.param_count(), 10_636_096);
    }

    #[test]
    fn too_small_input_fails_at_construction() {
        let err = build(InputShape::new(28, 28, 1)).unwrap_err();
        match err {
            SiameseError::DegenerateShape { stage, input } => {
                assert_eq!(stage, "conv3");
                assert_eq!(input, InputShape::new(28, 28, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn forward_produces_sigmoid_embeddings() {
        tch::manual_seed(0);
        let encoder = build(InputShape::default()).unwrap();
        let images = Tensor::randn([2, 1, 105, 105], (Kind::Float, Device::Cpu));
        let embedding = tch::no_grad(|| encoder.forward(&images)).unwrap();
        assert_eq!(embedding.size(), vec![2, EMBEDDING_DIM]);
        assert!(embedding.min().double_value(&[]) > 0.0);
        assert!(embedding.max().double_value(&[]) < 1.0);
    }

    #[test]
    fn unbatched_image_is_promoted() {
        let encoder = build(InputShape::default()).unwrap();
        let image = Tensor::rand([1, 105, 105], (Kind::Double, Device::Cpu));
        let embedding = tch::no_grad(|| encoder.forward(&image)).unwrap();
        assert_eq!(embedding.size(), vec![1, EMBEDDING_DIM]);
        assert_eq!(embedding.kind(), Kind::Float);
    }

    #[test]
    fn mismatched_image_fails_at_first_convolution() {
        let encoder = build(InputShape::default()).unwrap();
        let image = Tensor::zeros([1, 1, 28, 28], (Kind::Float, Device::Cpu));
        match encoder.forward(&image).unwrap_err() {
            SiameseError::ShapeMismatch {
                stage,
                expected,
                actual,
            } => {
                assert_eq!(stage, "conv1");
                assert_eq!(expected, vec![1, 105, 105]);
                assert_eq!(actual, vec![1, 1, 28, 28]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
