use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub name: String,
    /// Per-sample output shape (batch dimension omitted).
    pub output_shape: Vec<i64>,
    pub params: i64,
}

/// Layer-by-layer overview of a built network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSummary {
    layers: Vec<LayerSummary>,
}

impl ModelSummary {
    pub fn new(layers: Vec<LayerSummary>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[LayerSummary] {
        &self.layers
    }

    pub fn total_params(&self) -> i64 {
        self.layers.iter().map(|l| l.params).sum()
    }
}

fn format_shape(shape: &[i64]) -> String {
    let dims: Vec<String> = std::iter::once("N".to_string())
        .chain(shape.iter().map(i64::to_string))
        .collect();
    format!("({})", dims.join(", "))
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<24} {:<22} {:>12}", "Layer", "Output shape", "Params")?;
        writeln!(f, "{}", "=".repeat(60))?;
        for layer in &self.layers {
            writeln!(
                f,
                "{:<24} {:<22} {:>12}",
                layer.name,
                format_shape(&layer.output_shape),
                layer.params
            )?;
        }
        writeln!(f, "{}", "=".repeat(60))?;
        write!(f, "Total params: {}", self.total_params())
    }
}
