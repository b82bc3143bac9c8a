//! Template rendering of the generated program and its Makefile

use log::debug;
use minijinja::{context, Environment, Value};
use mwg_codegen::{BuildDescriptor, GeneratedWorkload};
use mwg_common::{GeneratorError, Result};

const MAIN_TEMPLATE: &str = include_str!("../templates/main.c.j2");
const MAKEFILE_TEMPLATE: &str = include_str!("../templates/Makefile.j2");

pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_template("main.c", MAIN_TEMPLATE).map_err(template_error)?;
        env.add_template("Makefile", MAKEFILE_TEMPLATE).map_err(template_error)?;
        Ok(Self { env })
    }

    pub fn main_source(&self, workload: &GeneratedWorkload) -> Result<String> {
        let includes: Vec<String> = workload.includes.iter().map(ToString::to_string).collect();
        self.render(
            "main.c",
            context!(
                INCLUDES => includes,
                DEFINITIONS => &workload.definitions,
                BODY_initialization => &workload.initialization,
                BODY_kernel => &workload.kernel,
                BODY_finalization => &workload.finalization
            ),
        )
    }

    pub fn makefile(&self, build: &BuildDescriptor) -> Result<String> {
        self.render(
            "Makefile",
            context!(
                COMPILER => &build.compiler,
                FLAGS => build.flags(),
                LINKER_FLAGS => build.linker_flags(),
                INCLUDE_PATH => build.include_path(),
                LIBRARY_PATH => build.library_path(),
                EXEC_PREFIX => &build.exec_prefix
            ),
        )
    }

    fn render(&self, name: &str, ctx: Value) -> Result<String> {
        let template = self.env.get_template(name).map_err(template_error)?;
        let rendered = template.render(ctx).map_err(template_error)?;
        debug!("Rendered {} ({} bytes)", name, rendered.len());
        Ok(rendered)
    }
}

fn template_error(e: minijinja::Error) -> GeneratorError {
    GeneratorError::Template {
        message: e.to_string(),
    }
}
