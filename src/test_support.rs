use crate::config::Template;
use crate::context::RunContext;
use crate::plan::{Plan, PlanInputs, build_plan};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A template directory on disk with products, prompts, and a template file.
pub(crate) struct Workspace {
    pub(crate) dir: TempDir,
    pub(crate) template_path: PathBuf,
}

impl Workspace {
    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn template(&self) -> Template {
        Template::load(&self.template_path).unwrap()
    }

    /// Plan the workspace template into a fresh run directory.
    pub(crate) fn plan(&self) -> (RunContext, Plan) {
        let template = self.template();
        let inputs = PlanInputs::load(&template).unwrap();
        let ctx = RunContext::create(
            &template.output_dir(),
            &template.name,
            chrono::Local::now(),
        )
        .unwrap();
        let plan = build_plan(&template, &inputs, ctx.run_id()).unwrap();
        (ctx, plan)
    }
}

pub(crate) fn write_images(dir: &Path, names: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for name in names {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"fake image bytes").unwrap();
    }
}

/// Scene-generation workspace with three products and three prompts.
///
/// `extra` is appended verbatim to the template YAML.
pub(crate) fn scene_workspace(group_count: u32, extra: &str) -> Workspace {
    let dir = TempDir::new().unwrap();
    write_images(&dir.path().join("products"), &["a.jpg", "b.png", "c.webp"]);
    std::fs::write(
        dir.path().join("prompts.yaml"),
        "prompts:\n  - id: kitchen\n    template: \"{product_count} item(s) on a kitchen counter, shot {image_num}\"\n  - id: beach\n    template: \"{product_count} item(s) on a beach, shot {image_num}\"\n  - id: studio\n    template: \"{product_count} item(s) in a studio, shot {image_num}\"\n",
    )
    .unwrap();

    let template_path = dir.path().join("task.yaml");
    std::fs::write(
        &template_path,
        format!(
            "name: Test Run\nmode: scene_generation\ngroup_count: {}\nimages_per_group: 2\nseed: 7\nproduct_images:\n  source_dir: products\nscene_prompts:\n  source: prompts.yaml\noutput:\n  base_dir: outputs\n{}",
            group_count, extra
        ),
    )
    .unwrap();

    Workspace { dir, template_path }
}
