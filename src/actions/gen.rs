use async_stream::try_stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::eval::action::{Action, ActionProps, FragmentStream, Step};
use crate::eval::context::format_address;
use crate::event::event_bus::GenerationEvent;
use crate::outputs::OutputValue;
use crate::prompt::{PromptFragment, Role};
use crate::provider::provider::{CompletionRequest, SamplingParams};

/// Per-generation overrides. Unset fields fall back to the agent's
/// configuration, and an unset `stop` to the literal after the placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenOptions {
    #[serde(default)]
    pub stop: Option<String>,
    #[serde(default = "default_n")]
    pub n: usize,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub stream: Option<bool>,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            stop: None,
            n: default_n(),
            temperature: None,
            top_p: None,
            max_tokens: None,
            stream: None,
        }
    }
}

fn default_n() -> usize {
    1
}

impl GenOptions {
    pub fn stop<S: Into<String>>(mut self, stop: S) -> Self {
        self.stop = Some(stop.into());
        self
    }

    pub fn n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }
}

/// Asks the bound model to continue the transcript and records the result.
pub struct Gen {
    name: String,
    options: GenOptions,
}

impl Gen {
    pub fn new(name: &str, options: GenOptions) -> Self {
        Self {
            name: name.to_string(),
            options,
        }
    }

    fn sampling(&self, props: &ActionProps) -> SamplingParams {
        let defaults = &props.context.sampling;
        SamplingParams {
            n: self.options.n.max(1),
            temperature: self.options.temperature.unwrap_or(defaults.temperature),
            top_p: self.options.top_p.or(defaults.top_p),
            max_tokens: self.options.max_tokens.or(defaults.max_tokens),
        }
    }
}

impl Step for Gen {
    fn run(&self, props: ActionProps) -> FragmentStream {
        let name = self.name.clone();
        let sampling = self.sampling(&props);
        let stream = self.options.stream.unwrap_or(props.context.stream);
        let stop = self
            .options
            .stop
            .clone()
            .or_else(|| props.next_literal.clone())
            .filter(|stop| !stop.is_empty());

        try_stream! {
            let context = props.context.clone();
            let model = context.model.clone();
            let samples = sampling.n;

            let view = {
                let outputs = props.outputs.read();
                let transcript = props.transcript.read();
                transcript.view(model.is_chat(), &outputs)
            };
            let request = CompletionRequest {
                prompt: view?,
                stop,
                stream,
                sampling,
            };
            debug!(
                name = %name,
                address = %format_address(&context.output_address),
                provider = model.name(),
                samples,
                stream,
                "Generation requested"
            );

            let mut tokens = model.complete(request).await?;
            let mut accumulators = vec![String::new(); samples];
            let mut count = 0usize;
            while let Some(item) = tokens.next().await {
                let (index, token) = item?;
                let Some(accumulator) = accumulators.get_mut(index) else {
                    warn!(name = %name, index, samples, "Dropping token for out-of-range sample");
                    continue;
                };
                accumulator.push_str(&token);
                count += 1;
                // Only the first sample is streamed.
                if stream && index == 0 {
                    yield PromptFragment::generated(token, Role::Assistant);
                }
            }
            trace!(name = %name, tokens = count, "Generation finished");

            let value = if samples == 1 {
                OutputValue::Text(accumulators[0].clone())
            } else {
                OutputValue::List(accumulators.iter().cloned().map(OutputValue::Text).collect())
            };
            let written = props.outputs.write().write(
                &context.output_address,
                &name,
                value.clone(),
                context.array_scoped,
            );
            written?;
            props
                .events
                .publish(GenerationEvent::new(&name, &context.output_address, value));

            if !stream {
                yield PromptFragment::generated(accumulators.swap_remove(0), Role::Assistant);
            }
        }
        .boxed()
    }
}

pub fn gen(name: &str) -> Action {
    gen_with(name, GenOptions::default())
}

pub fn gen_with(name: &str, options: GenOptions) -> Action {
    Action::step(Gen::new(name, options))
}
