use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use tensorflow::{Graph, SavedModelBundle, Session, SessionOptions, SessionRunArgs, Tensor};

use crate::classifier::{preprocess, scores_to_classification, Classifier, INPUT_SIZE};
use crate::error::{Error, Result};
use crate::grade::ClassificationResult;
use crate::resolver::ModelLoader;
use crate::timer::Timer;

/// Loads a complete TensorFlow SavedModel (graph and variables)
pub struct SavedModelLoader {
    pub input_op: String,
    pub output_op: String,
}

impl Default for SavedModelLoader {
    fn default() -> Self {
        SavedModelLoader {
            input_op: "serving_default_input_1".to_owned(),
            output_op: "StatefulPartitionedCall".to_owned(),
        }
    }
}

impl ModelLoader for SavedModelLoader {
    fn name(&self) -> &'static str {
        "saved-model"
    }

    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>> {
        if !path.is_dir() {
            return Err(Error::ModelLoad(format!(
                "{} is not a SavedModel directory",
                path.display()
            )));
        }

        let mut graph = Graph::new();
        let session =
            SavedModelBundle::load(&SessionOptions::new(), &["serve"], &mut graph, path)?.session;

        // fail at startup rather than on the first request
        graph.operation_by_name_required(&self.input_op)?;
        graph.operation_by_name_required(&self.output_op)?;

        Ok(Arc::new(SavedModelClassifier {
            graph,
            session,
            input_op: self.input_op.clone(),
            output_op: self.output_op.clone(),
        }))
    }
}

pub struct SavedModelClassifier {
    /// TensorFlow model graph
    graph: Graph,

    /// TensorFlow session
    session: Session,

    input_op: String,
    output_op: String,
}

impl SavedModelClassifier {
    fn run(&self, image: &[f32]) -> Result<Vec<f32>> {
        let mut t = Timer::started("Running session");

        let side = INPUT_SIZE as u64;
        let input = Tensor::new(&[1, side, side, 3]).with_values(image)?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&self.graph.operation_by_name_required(&self.input_op)?, 0, &input);
        let result = args.request_fetch(&self.graph.operation_by_name_required(&self.output_op)?, 0);

        self.session.run(&mut args)?;
        let output: Tensor<f32> = args.fetch(result)?;

        t.stop();

        Ok(output.iter().cloned().collect())
    }
}

impl Classifier for SavedModelClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<ClassificationResult> {
        let input = preprocess(image, INPUT_SIZE);
        let scores = self.run(&input)?;

        scores_to_classification(&scores)
    }
}
