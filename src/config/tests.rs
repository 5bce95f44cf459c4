//! Tests for template and service config loading.

use crate::config::{
    CountSpec, GenerationMode, GenerationTarget, IMAGE_API_KEY_ENV, SelectionMode, ServiceConfig,
    TEXT_API_KEY_ENV, Template,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCENE_TEMPLATE: &str = r#"
name: Spring Catalog
mode: scene_generation
group_count: 4
product_images:
  source_dir: products
scene_prompts:
  source: prompts.yaml
"#;

const TRANSFER_TEMPLATE: &str = r#"
name: Transfer
mode: subject_transfer
group_count: 5
images_per_group: [1, 3]
product_images:
  source_dir: products
  count_per_group: 2
reference_images:
  source_dir: references
transfer_prompts:
  specified_prompt: swap
  source: transfer.json
"#;

#[test]
fn test_parse_minimal_scene_template_uses_defaults() {
    let template = Template::from_yaml(SCENE_TEMPLATE).unwrap();

    assert_eq!(template.name, "Spring Catalog");
    assert_eq!(template.mode, GenerationMode::SceneGeneration);
    assert_eq!(template.generation_target, GenerationTarget::Both);
    assert_eq!(template.images_per_group, CountSpec::Fixed(1));
    assert_eq!(template.seed, None);

    let products = &template.product_images;
    assert_eq!(products.count_per_group, CountSpec::Fixed(1));
    assert_eq!(products.selection_mode, SelectionMode::Random);
    assert_eq!(products.specified_coverage, 100);
    assert!(products.strict);
    assert!(products.recursive);

    assert_eq!(template.output.base_dir, PathBuf::from("./outputs"));
    assert_eq!(template.output.aspect_ratio, "4:5");
    assert_eq!(template.output.resolution, "2K");
    assert_eq!(template.output.format, "png");
    assert_eq!(template.output.max_concurrent_groups, 3);

    assert!(template.text_generation.enabled);
    assert_eq!(template.text_generation.reference_samples, CountSpec::Range([3, 5]));
}

#[test]
fn test_parse_transfer_template() {
    let template = Template::from_yaml(TRANSFER_TEMPLATE).unwrap();

    assert_eq!(template.mode, GenerationMode::SubjectTransfer);
    assert_eq!(template.images_per_group, CountSpec::Range([1, 3]));
    assert_eq!(template.product_images.count_per_group, CountSpec::Fixed(2));
    assert_eq!(
        template.transfer_prompts.unwrap().specified_prompt.as_deref(),
        Some("swap")
    );
}

#[test]
fn test_json_template_is_accepted() {
    let json = r#"{
        "name": "json",
        "mode": "scene_generation",
        "group_count": 2,
        "product_images": {"source_dir": "p"},
        "scene_prompts": {"custom_template": "A {color} mug"},
        "template_variables": {"color": "red"}
    }"#;
    let template = Template::from_yaml(json).unwrap();

    assert_eq!(template.custom_template(), Some("A {color} mug"));
    assert_eq!(template.template_variables["color"], "red");
}

#[test]
fn test_unknown_field_is_rejected() {
    let yaml = format!("{}\ngroup_cnt: 3\n", SCENE_TEMPLATE);
    let err = Template::from_yaml(&yaml).unwrap_err();

    assert!(err.to_string().contains("group_cnt"));
}

#[test]
fn test_unknown_nested_field_is_rejected() {
    let yaml = r#"
name: x
mode: scene_generation
group_count: 1
product_images:
  source_dir: p
  count: 2
scene_prompts:
  source: prompts.yaml
"#;
    assert!(Template::from_yaml(yaml).is_err());
}

#[test]
fn test_invalid_mode_is_rejected() {
    let yaml = SCENE_TEMPLATE.replace("scene_generation", "collage");
    let err = Template::from_yaml(&yaml).unwrap_err();

    assert!(err.to_string().contains("failed to parse template"));
}

#[test]
fn test_zero_group_count_is_rejected() {
    let yaml = SCENE_TEMPLATE.replace("group_count: 4", "group_count: 0");
    let err = Template::from_yaml(&yaml).unwrap_err();

    assert!(err.to_string().contains("group_count must be at least 1"));
}

#[test]
fn test_validation_reports_all_problems_at_once() {
    let yaml = r#"
name: broken
mode: subject_transfer
group_count: 0
images_per_group: [4, 2]
product_images:
  source_dir: p
  specified_coverage: 150
output:
  max_concurrent_groups: 0
"#;
    let template: Template = serde_yaml::from_str(yaml).unwrap();
    let errors = template.validation_errors();

    assert!(errors.iter().any(|e| e.contains("group_count")));
    assert!(errors.iter().any(|e| e.contains("images_per_group")));
    assert!(errors.iter().any(|e| e.contains("specified_coverage")));
    assert!(errors.iter().any(|e| e.contains("max_concurrent_groups")));
    assert!(errors.iter().any(|e| e.contains("reference_images section")));
    assert!(errors.iter().any(|e| e.contains("transfer_prompts section")));
}

#[test]
fn test_scene_mode_requires_prompt_source_or_custom_template() {
    let yaml = r#"
name: x
mode: scene_generation
group_count: 1
product_images:
  source_dir: p
scene_prompts:
  specified_prompts: [a]
"#;
    let err = Template::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("source or a custom_template"));
}

#[test]
fn test_paths_override_satisfies_prompt_source() {
    let yaml = r#"
name: x
mode: scene_generation
group_count: 1
product_images:
  source_dir: p
scene_prompts: {}
paths:
  scene_prompts: /lib/prompts.yaml
"#;
    let template = Template::from_yaml(yaml).unwrap();
    assert_eq!(
        template.prompt_source(),
        Some(PathBuf::from("/lib/prompts.yaml"))
    );
}

#[test]
fn test_duplicate_specified_images_are_rejected() {
    let yaml = r#"
name: x
mode: scene_generation
group_count: 1
product_images:
  source_dir: p
  count_per_group: 3
  specified_images: [a.jpg, b.jpg, a.jpg]
scene_prompts:
  source: prompts.yaml
"#;
    let err = Template::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("'a.jpg' more than once"));
}

#[test]
fn test_mandatory_items_must_fit_count() {
    let yaml = r#"
name: x
mode: scene_generation
group_count: 1
product_images:
  source_dir: p
  count_per_group: [1, 3]
  specified_images: [a.jpg]
  must_include: b.jpg
scene_prompts:
  source: prompts.yaml
"#;
    let err = Template::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("2 mandatory item(s)"));
}

#[test]
fn test_must_include_inside_specified_counts_once() {
    let yaml = r#"
name: x
mode: scene_generation
group_count: 1
product_images:
  source_dir: p
  count_per_group: 1
  specified_images: [a.jpg]
  must_include: a.jpg
scene_prompts:
  source: prompts.yaml
"#;
    assert!(Template::from_yaml(yaml).is_ok());
}

#[test]
fn test_specified_mode_requires_list() {
    let yaml = r#"
name: x
mode: scene_generation
group_count: 1
product_images:
  source_dir: p
  selection_mode: specified
scene_prompts:
  source: prompts.yaml
"#;
    let err = Template::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("specified_images is empty"));
}

#[test]
fn test_reference_count_must_be_one() {
    let yaml = TRANSFER_TEMPLATE.replace(
        "  source_dir: references",
        "  source_dir: references\n  count_per_group: 2",
    );
    let err = Template::from_yaml(&yaml).unwrap_err();
    assert!(err.to_string().contains("one reference per group"));
}

#[test]
fn test_paired_lists_need_one_slot_per_group() {
    let yaml = TRANSFER_TEMPLATE
        .replace(
            "  count_per_group: 2\n",
            "  count_per_group: 1\n  specified_images: [a.jpg, b.jpg]\n",
        )
        .replace(
            "  source_dir: references",
            "  source_dir: references\n  specified_images: [r1.jpg, r2.jpg, r3.jpg]",
        );
    let template = Template::from_yaml(&yaml).unwrap();
    assert!(template.is_paired());

    let unpaired = TRANSFER_TEMPLATE.replace(
        "  count_per_group: 2\n",
        "  count_per_group: 1\n  specified_images: [a.jpg, b.jpg]\n",
    );
    let err = Template::from_yaml(&unpaired).unwrap_err();
    assert!(err.to_string().contains("2 mandatory item(s)"));
}

#[test]
fn test_load_resolves_paths_against_template_dir() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("task.yaml");
    std::fs::write(&path, TRANSFER_TEMPLATE).unwrap();

    let template = Template::load(&path).unwrap();

    assert_eq!(template.base_dir, temp.path());
    assert_eq!(template.product_source().unwrap(), temp.path().join("products"));
    assert_eq!(
        template.reference_source().unwrap(),
        temp.path().join("references")
    );
    assert_eq!(template.prompt_source(), Some(temp.path().join("transfer.json")));
    assert_eq!(template.output_dir(), temp.path().join("./outputs"));
}

#[test]
fn test_absolute_paths_are_kept() {
    let template = Template::from_yaml(
        &SCENE_TEMPLATE.replace("source_dir: products", "source_dir: /data/products"),
    )
    .unwrap();
    assert_eq!(
        template.product_source().unwrap(),
        Path::new("/data/products")
    );
}

#[test]
fn test_load_missing_template() {
    let err = Template::load("/nonexistent/task.yaml").unwrap_err();
    assert!(err.to_string().contains("failed to read template"));
}

#[test]
fn test_service_config_defaults() {
    let yaml = r#"
image_service:
  base_url: https://images.example.com/api
  api_key: file-key
text_service:
  base_url: https://llm.example.com/v1
"#;
    let config = ServiceConfig::from_yaml(yaml).unwrap();

    let image = config.image_service.unwrap();
    assert_eq!(image.model, "nano-banana-pro");
    assert_eq!(image.poll_interval_secs, 2);
    assert_eq!(image.max_poll_interval_secs, 15);
    assert_eq!(image.max_wait_secs, 1500);
    assert_eq!(image.max_retries, 3);

    let text = config.text_service.unwrap();
    assert!((text.temperature - 0.8).abs() < f32::EPSILON);
    assert_eq!(text.request_timeout_secs, 60);

    assert_eq!(config.rate_limit.max_requests, 20);
    assert_eq!(config.rate_limit.window_secs, 10);
}

#[test]
fn test_service_config_rejects_bad_url() {
    let yaml = "image_service:\n  base_url: not a url\n";
    let err = ServiceConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("image_service.base_url"));
}

#[test]
fn test_service_config_rejects_zero_rate_limit() {
    let yaml = "rate_limit:\n  max_requests: 0\n";
    assert!(ServiceConfig::from_yaml(yaml).is_err());
}

#[test]
fn test_api_key_overrides() {
    let yaml = r#"
image_service:
  base_url: https://images.example.com
  api_key: file-key
text_service:
  base_url: https://llm.example.com
  api_key: text-file-key
"#;
    let mut config = ServiceConfig::from_yaml(yaml).unwrap();
    config.apply_overrides(|key| match key {
        IMAGE_API_KEY_ENV => Some("env-key".to_string()),
        TEXT_API_KEY_ENV => Some(String::new()),
        _ => None,
    });

    assert_eq!(config.image_service.unwrap().api_key, "env-key");
    assert_eq!(config.text_service.unwrap().api_key, "text-file-key");
}

#[test]
#[serial_test::serial]
fn test_load_applies_environment() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.yaml");
    std::fs::write(&path, "image_service:\n  base_url: https://img.example.com\n").unwrap();

    // SAFETY: serialized with other env-touching tests.
    unsafe { std::env::set_var(IMAGE_API_KEY_ENV, "from-env") };
    let config = ServiceConfig::load(&path);
    unsafe { std::env::remove_var(IMAGE_API_KEY_ENV) };

    assert_eq!(config.unwrap().image_service.unwrap().api_key, "from-env");
}
