use tracing::trace;

use crate::{error::StatsError, layer::layer::Layer, tensor::{tensor_desc::TensorDesc, value::Value}};

// Observer notified after every layer invoked through a ForwardContext
pub trait LayerHook {
    fn on_layer(
        &mut self,
        name: &str,
        layer: &dyn Layer,
        input: &TensorDesc,
        output: &Value,
    ) -> Result<(), StatsError>;
}

pub trait Module {
    fn forward(&self, input: Value, ctx: &mut ForwardContext<'_>) -> Result<Value, StatsError>;

    // Forward pass with no hooks installed
    fn run(&self, input: Value) -> Result<Value, StatsError> {
        self.forward(input, &mut ForwardContext::new())
    }
}

pub struct ForwardContext<'h> {
    scope: Vec<String>,
    hooks: Vec<&'h mut dyn LayerHook>,
}

impl<'h> ForwardContext<'h> {
    pub fn new() -> Self {
        Self {
            scope: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: &'h mut dyn LayerHook) -> Self {
        self.hooks.push(hook);
        self
    }

    // Dotted name of `name` inside the current scope
    pub fn qualified_name(&self, name: &str) -> String {
        if self.scope.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.scope.join("."), name)
        }
    }

    pub fn call(&mut self, name: &str, layer: &dyn Layer, input: Value) -> Result<Value, StatsError> {
        let input_desc = input.desc().clone();
        let output = layer.apply(input)?;

        if !self.hooks.is_empty() {
            let qualified = self.qualified_name(name);
            trace!(layer = %qualified, kind = %layer.describe(), input = %input_desc, output = %output.desc(), "layer called");
            for hook in self.hooks.iter_mut() {
                hook.on_layer(&qualified, layer, &input_desc, &output)?;
            }
        }

        Ok(output)
    }

    pub fn scope<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<R, StatsError>,
    ) -> Result<R, StatsError> {
        self.scope.push(name.to_string());
        let result = f(self);
        self.scope.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::identity::IdentityLayer;

    #[derive(Default)]
    struct NameRecorder {
        names: Vec<String>,
    }

    impl LayerHook for NameRecorder {
        fn on_layer(&mut self, name: &str, _: &dyn Layer, _: &TensorDesc, _: &Value) -> Result<(), StatsError> {
            self.names.push(name.to_string());
            Ok(())
        }
    }

    #[test]
    fn hooks_see_scoped_names() {
        let mut recorder = NameRecorder::default();
        {
            let mut ctx = ForwardContext::new().with_hook(&mut recorder);
            let x = Value::Symbolic(TensorDesc::new_vector(4));
            let x = ctx.call("stem", &IdentityLayer, x).unwrap();
            ctx.scope("layer1", |ctx| {
                ctx.scope("0", |ctx| ctx.call("conv1", &IdentityLayer, x))
            }).unwrap();
        }
        assert_eq!(recorder.names, vec!["stem", "layer1.0.conv1"]);
    }

    #[test]
    fn scope_is_popped_on_error() {
        let mut ctx = ForwardContext::new();
        let result: Result<(), _> = ctx.scope("block", |_| Err(StatsError::Unsupported("x".into())));
        assert!(result.is_err());
        assert_eq!(ctx.qualified_name("fc"), "fc");
    }
}
