use crate::{ReverieError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Frames consumed per processing call; leftovers wait for the next push.
const CHUNK_FRAMES: usize = 1024;

/// Streaming mono resampler for the recognition path.
pub struct MonoResampler {
    inner: SincFixedIn<f32>,
    queue: Vec<f32>,
}

impl MonoResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(ReverieError::Config(
                "Sample rates must be greater than 0".into(),
            ));
        }

        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };

        let inner = SincFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            2.0,
            params,
            CHUNK_FRAMES,
            1,
        )
        .map_err(|e| ReverieError::AudioDevice(format!("Failed to create resampler: {e}")))?;

        Ok(Self {
            inner,
            queue: Vec::with_capacity(CHUNK_FRAMES * 2),
        })
    }

    /// Feed captured samples; returns the output of every full chunk that
    /// became available.
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        self.queue.extend_from_slice(samples);

        let mut output = Vec::new();
        while self.queue.len() >= CHUNK_FRAMES {
            let chunk: Vec<f32> = self.queue.drain(..CHUNK_FRAMES).collect();
            let processed = self
                .inner
                .process(&[chunk], None)
                .map_err(|e| ReverieError::AudioDevice(format!("Resampling failed: {e}")))?;
            output.extend_from_slice(&processed[0]);
        }

        Ok(output)
    }
}
