//! Planner tests: selection constraints, prompt policies, and determinism.

use super::*;
use crate::config::Template;
use crate::error::GenError;
use crate::prompt::{PromptDefinition, PromptLibrary};
use crate::resource::{ResourcePool, covered_groups};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn library(entries: &[(&str, &str)]) -> PromptLibrary {
    PromptLibrary::from_prompts(
        entries
            .iter()
            .map(|(id, template)| PromptDefinition {
                id: id.to_string(),
                name: None,
                description: String::new(),
                enabled: true,
                tags: Vec::new(),
                template: template.to_string(),
            })
            .collect(),
    )
}

fn scene_inputs(products: &[&str], prompts: &[(&str, &str)]) -> PlanInputs {
    PlanInputs {
        products: ResourcePool::from_items(Path::new("/products"), products.iter().copied()),
        references: None,
        library: Some(library(prompts)),
    }
}

fn transfer_inputs(products: &[&str], references: &[&str]) -> PlanInputs {
    PlanInputs {
        products: ResourcePool::from_items(Path::new("/products"), products.iter().copied()),
        references: Some(ResourcePool::from_items(
            Path::new("/references"),
            references.iter().copied(),
        )),
        library: Some(library(&[("swap", "Place the product into the reference scene")])),
    }
}

const PROMPTS: &[(&str, &str)] = &[
    ("kitchen", "Group {group_num}: a product on a kitchen counter"),
    ("beach", "Group {group_num}: a product on the beach"),
    ("studio", "Group {group_num}: a product in a white studio"),
];

fn plan(template: &Template, inputs: &PlanInputs, seed: u64) -> PlannedGroups {
    Planner::new(template, inputs)
        .plan(&mut StdRng::seed_from_u64(seed))
        .unwrap()
}

#[test]
fn test_specified_image_with_full_coverage_scenario() {
    let template = Template::from_yaml(
        r#"
name: scenario
mode: scene_generation
group_count: 3
images_per_group: 1
product_images:
  source_dir: products
  count_per_group: 2
  specified_images: [A.jpg]
  specified_coverage: 100
scene_prompts:
  source: prompts.json
"#,
    )
    .unwrap();
    let inputs = scene_inputs(&["A.jpg", "B.jpg", "C.jpg"], PROMPTS);

    for seed in 0..10 {
        let planned = plan(&template, &inputs, seed);
        assert_eq!(planned.groups.len(), 3);
        for group in &planned.groups {
            assert_eq!(group.product_items.len(), 2);
            assert_eq!(group.product_items[0], "A.jpg");
            assert!(group.product_items[1] == "B.jpg" || group.product_items[1] == "C.jpg");
            assert_eq!(group.images_to_produce, 1);
            assert_eq!(group.image_prompts.len(), 1);
        }
    }
}

#[test]
fn test_reference_exhaustion_before_reuse_scenario() {
    let template = Template::from_yaml(
        r#"
name: transfer
mode: subject_transfer
group_count: 5
product_images:
  source_dir: products
reference_images:
  source_dir: references
transfer_prompts:
  source: prompts.json
"#,
    )
    .unwrap();
    let inputs = transfer_inputs(&["p1.jpg", "p2.jpg"], &["R1.jpg", "R2.jpg"]);

    for seed in 0..20 {
        let planned = plan(&template, &inputs, seed);
        let refs: Vec<&str> = planned
            .groups
            .iter()
            .map(|g| g.reference_item.as_deref().unwrap())
            .collect();

        // Each pair of consecutive groups in a cycle covers the whole pool.
        for cycle in refs.chunks(2).filter(|c| c.len() == 2) {
            assert_ne!(cycle[0], cycle[1]);
        }
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (position, r) in refs.iter().enumerate() {
            *counts.entry(r).or_default() += 1;
            if counts[r] == 3 {
                assert_eq!(position, 4);
                assert_eq!(counts["R1.jpg"].min(counts["R2.jpg"]), 2);
            }
        }
    }
}

#[test]
fn test_reference_cycle_covers_pool_before_reuse() {
    let template = Template::from_yaml(
        r#"
name: transfer
mode: subject_transfer
group_count: 9
product_images:
  source_dir: products
reference_images:
  source_dir: references
transfer_prompts:
  source: prompts.json
"#,
    )
    .unwrap();
    let inputs = transfer_inputs(&["p.jpg"], &["r1", "r2", "r3"]);
    let planned = plan(&template, &inputs, 42);

    for cycle in planned.groups.chunks(3) {
        let distinct: HashSet<_> = cycle.iter().map(|g| g.reference_item.clone()).collect();
        assert_eq!(distinct.len(), 3);
    }
    for pair in planned.groups.windows(2) {
        assert_ne!(pair[0].reference_item, pair[1].reference_item);
    }
    assert_eq!(planned.cursors.reference.as_ref().unwrap().cycles, 3);
}

fn reference_coverage_template(coverage: u8) -> Template {
    Template::from_yaml(&format!(
        r#"
name: transfer
mode: subject_transfer
group_count: 5
product_images:
  source_dir: products
reference_images:
  source_dir: references
  specified_images: [R1.jpg]
  specified_coverage: {coverage}
transfer_prompts:
  source: prompts.json
"#
    ))
    .unwrap()
}

#[test]
fn test_reference_coverage_exact_groups() {
    let template = reference_coverage_template(40);
    let inputs = transfer_inputs(&["p1.jpg"], &["R1.jpg", "R2.jpg", "R3.jpg"]);

    for seed in 0..50 {
        let planned = plan(&template, &inputs, seed);
        let refs: Vec<&str> = planned
            .groups
            .iter()
            .map(|g| g.reference_item.as_deref().unwrap())
            .collect();

        assert_eq!(refs[..2], ["R1.jpg", "R1.jpg"], "seed {}", seed);
        assert!(refs[2..].iter().all(|r| *r != "R1.jpg"), "seed {}: {:?}", seed, refs);
        assert_ne!(refs[2], refs[3]);
    }
}

#[test]
fn test_reference_zero_coverage_never_uses_specified() {
    let template = reference_coverage_template(0);
    let inputs = transfer_inputs(&["p1.jpg"], &["R1.jpg", "R2.jpg"]);

    for seed in 0..10 {
        let planned = plan(&template, &inputs, seed);
        assert!(
            planned
                .groups
                .iter()
                .all(|g| g.reference_item.as_deref() == Some("R2.jpg"))
        );
    }
}

#[test]
fn test_reference_coverage_without_other_references_is_config_error() {
    let template = reference_coverage_template(40);
    let inputs = transfer_inputs(&["p1.jpg"], &["R1.jpg"]);

    let err = Planner::new(&template, &inputs)
        .plan(&mut StdRng::seed_from_u64(1))
        .unwrap_err();
    assert!(matches!(err, GenError::Config(_)));
    assert!(err.to_string().contains("specified_coverage"));
}

#[test]
fn test_pairing_zips_specified_lists() {
    let template = Template::from_yaml(
        r#"
name: pairs
mode: subject_transfer
group_count: 4
product_images:
  source_dir: products
  specified_images: [p2.jpg, p3.jpg]
reference_images:
  source_dir: references
  specified_images: [r3.jpg, r1.jpg, r2.jpg]
transfer_prompts:
  source: prompts.json
"#,
    )
    .unwrap();
    let inputs = transfer_inputs(
        &["p1.jpg", "p2.jpg", "p3.jpg"],
        &["r1.jpg", "r2.jpg", "r3.jpg"],
    );
    let planned = plan(&template, &inputs, 7);

    assert_eq!(planned.groups[0].product_items, vec!["p2.jpg"]);
    assert_eq!(planned.groups[0].reference_item.as_deref(), Some("r3.jpg"));
    assert_eq!(planned.groups[1].product_items, vec!["p3.jpg"]);
    assert_eq!(planned.groups[1].reference_item.as_deref(), Some("r1.jpg"));
    for group in &planned.groups[2..] {
        assert_eq!(group.product_items.len(), 1);
        assert!(group.reference_item.is_some());
    }
}

#[test]
fn test_transfer_prompt_shared_by_all_groups() {
    let template = Template::from_yaml(
        r#"
name: transfer
mode: subject_transfer
group_count: 4
product_images:
  source_dir: products
reference_images:
  source_dir: references
transfer_prompts:
  source: prompts.json
"#,
    )
    .unwrap();
    let mut inputs = transfer_inputs(&["p.jpg"], &["r1", "r2"]);
    inputs.library = Some(library(&[("a", "swap A"), ("b", "swap B"), ("c", "swap C")]));

    let planned = plan(&template, &inputs, 5);
    let ids: HashSet<_> = planned.groups.iter().map(|g| g.prompt_id.clone()).collect();
    assert_eq!(ids.len(), 1);
}

#[test]
fn test_scene_adjacent_prompts_differ() {
    let template = Template::from_yaml(
        r#"
name: scenes
mode: scene_generation
group_count: 12
product_images:
  source_dir: products
scene_prompts:
  source: prompts.json
"#,
    )
    .unwrap();
    let inputs = scene_inputs(&["a.jpg", "b.jpg"], &[("x", "X"), ("y", "Y")]);

    for seed in 0..10 {
        let planned = plan(&template, &inputs, seed);
        for pair in planned.groups.windows(2) {
            assert_ne!(pair[0].prompt_text, pair[1].prompt_text);
        }
        assert!(planned.warnings.iter().any(|w| w.contains("will be reused")));
    }
}

#[test]
fn test_scene_prompts_unique_while_pool_lasts() {
    let template = Template::from_yaml(
        r#"
name: scenes
mode: scene_generation
group_count: 3
product_images:
  source_dir: products
scene_prompts:
  source: prompts.json
  specified_prompts: [studio]
"#,
    )
    .unwrap();
    let inputs = scene_inputs(&["a.jpg"], PROMPTS);
    let planned = plan(&template, &inputs, 1);

    assert_eq!(planned.groups[0].prompt_id, "studio");
    let ids: HashSet<_> = planned.groups.iter().map(|g| g.prompt_id.clone()).collect();
    assert_eq!(ids.len(), 3);
    assert!(planned.warnings.is_empty());
}

#[test]
fn test_prompts_render_builtins_per_image() {
    let template = Template::from_yaml(
        r#"
name: render
mode: scene_generation
group_count: 2
images_per_group: 2
product_images:
  source_dir: products
  count_per_group: 2
scene_prompts:
  custom_template: "{brand} g{group_num}/{total_groups} img{image_num} x{product_count} {mode}"
template_variables:
  brand: Acme
"#,
    )
    .unwrap();
    let mut inputs = scene_inputs(&["a.jpg", "b.jpg"], PROMPTS);
    inputs.library = None;

    let planned = plan(&template, &inputs, 0);
    let second = &planned.groups[1];

    assert_eq!(second.prompt_id, "custom");
    assert_eq!(
        second.image_prompts,
        vec![
            "Acme g2/2 img1 x2 scene_generation",
            "Acme g2/2 img2 x2 scene_generation"
        ]
    );
    assert_eq!(second.prompt_text, second.image_prompts[0]);
}

#[test]
fn test_undefined_prompt_variable_is_template_error() {
    let template = Template::from_yaml(
        r#"
name: render
mode: scene_generation
group_count: 1
product_images:
  source_dir: products
scene_prompts:
  custom_template: "A {color} mug"
"#,
    )
    .unwrap();
    let mut inputs = scene_inputs(&["a.jpg"], PROMPTS);
    inputs.library = None;

    let err = Planner::new(&template, &inputs)
        .plan(&mut StdRng::seed_from_u64(0))
        .unwrap_err();
    assert!(matches!(err, GenError::Template(_)));
    assert!(err.to_string().contains("'color'"));
}

#[test]
fn test_images_per_group_range_is_respected() {
    let template = Template::from_yaml(
        r#"
name: range
mode: scene_generation
group_count: 30
images_per_group: [2, 4]
product_images:
  source_dir: products
  count_per_group: [1, 3]
scene_prompts:
  source: prompts.json
"#,
    )
    .unwrap();
    let inputs = scene_inputs(&["a", "b", "c", "d"], PROMPTS);
    let planned = plan(&template, &inputs, 13);

    for group in &planned.groups {
        assert!((2..=4).contains(&group.images_to_produce));
        assert_eq!(group.image_prompts.len(), group.images_to_produce);
        assert!((1..=3).contains(&group.product_items.len()));
        let unique: HashSet<_> = group.product_items.iter().collect();
        assert_eq!(unique.len(), group.product_items.len());
    }
}

#[test]
fn test_partial_coverage_exact_count() {
    for (coverage, group_count) in [(0u8, 5usize), (40, 5), (50, 7), (100, 4)] {
        let template = Template::from_yaml(&format!(
            r#"
name: coverage
mode: scene_generation
group_count: {group_count}
product_images:
  source_dir: products
  count_per_group: 2
  specified_images: [hero.jpg]
  specified_coverage: {coverage}
scene_prompts:
  source: prompts.json
"#
        ))
        .unwrap();
        let inputs = scene_inputs(&["hero.jpg", "b.jpg", "c.jpg", "d.jpg"], PROMPTS);
        let planned = plan(&template, &inputs, 21);

        let with_hero: Vec<usize> = planned
            .groups
            .iter()
            .filter(|g| g.product_items.contains(&"hero.jpg".to_string()))
            .map(|g| g.group_index)
            .collect();
        let expected = covered_groups(coverage, group_count);
        assert_eq!(with_hero, (0..expected).collect::<Vec<_>>());
    }
}

#[test]
fn test_same_seed_reproduces_plan() {
    let template = Template::from_yaml(
        r#"
name: seeded
mode: scene_generation
group_count: 6
images_per_group: [1, 3]
product_images:
  source_dir: products
  count_per_group: [1, 2]
scene_prompts:
  source: prompts.json
"#,
    )
    .unwrap();
    let inputs = scene_inputs(&["a", "b", "c"], PROMPTS);

    assert_eq!(plan(&template, &inputs, 77).groups, plan(&template, &inputs, 77).groups);
}

#[test]
fn test_sequential_planning_is_deterministic_and_wraps() {
    let template = Template::from_yaml(
        r#"
name: seq
mode: scene_generation
group_count: 3
product_images:
  source_dir: products
  count_per_group: 2
  selection_mode: sequential
scene_prompts:
  custom_template: shot
"#,
    )
    .unwrap();
    let mut inputs = scene_inputs(&["1.jpg", "2.jpg", "3.jpg"], PROMPTS);
    inputs.library = None;

    let first = plan(&template, &inputs, 1);
    let second = plan(&template, &inputs, 2);
    let items = |p: &PlannedGroups| {
        p.groups
            .iter()
            .map(|g| g.product_items.clone())
            .collect::<Vec<_>>()
    };

    assert_eq!(items(&first), items(&second));
    assert_eq!(items(&first)[1], vec!["3.jpg", "1.jpg"]);
    assert_eq!(first.warnings.len(), 1);
    assert!(first.warnings[0].contains("wrapped"));
}

#[test]
fn test_count_exceeding_pool_is_config_error() {
    let template = Template::from_yaml(
        r#"
name: big
mode: scene_generation
group_count: 1
product_images:
  source_dir: products
  count_per_group: 5
scene_prompts:
  source: prompts.json
"#,
    )
    .unwrap();
    let inputs = scene_inputs(&["a", "b"], PROMPTS);

    let err = Planner::new(&template, &inputs)
        .plan(&mut StdRng::seed_from_u64(0))
        .unwrap_err();
    assert!(matches!(err, GenError::Config(_)));
}

#[test]
fn test_build_plan_from_disk() {
    let temp = TempDir::new().unwrap();
    let products = temp.path().join("products");
    fs::create_dir_all(&products).unwrap();
    for name in ["a.jpg", "b.png", "c.webp"] {
        fs::write(products.join(name), b"img").unwrap();
    }
    fs::write(
        temp.path().join("prompts.json"),
        r#"{"prompts": [{"id": "one", "template": "Scene {group_num}"}]}"#,
    )
    .unwrap();
    let template_path = temp.path().join("task.yaml");
    fs::write(
        &template_path,
        "name: disk\nmode: scene_generation\ngroup_count: 2\nseed: 99\nproduct_images:\n  source_dir: products\nscene_prompts:\n  source: prompts.json\n",
    )
    .unwrap();

    let template = Template::load(&template_path).unwrap();
    let inputs = PlanInputs::load(&template).unwrap();
    let plan = build_plan(&template, &inputs, "disk_20250101_000000".to_string()).unwrap();

    assert_eq!(plan.version, PLAN_VERSION);
    assert_eq!(plan.seed, 99);
    assert_eq!(plan.total_groups(), 2);
    assert_eq!(plan.product_root, products);
    assert_eq!(plan.groups[1].prompt_text, "Scene 2");

    let again = build_plan(&template, &inputs, "other".to_string()).unwrap();
    assert_eq!(plan.groups, again.groups);
}

#[test]
fn test_plan_inputs_missing_products_is_resource_error() {
    let temp = TempDir::new().unwrap();
    let template_path = temp.path().join("task.yaml");
    fs::write(
        &template_path,
        "name: x\nmode: scene_generation\ngroup_count: 1\nproduct_images:\n  source_dir: nowhere\nscene_prompts:\n  custom_template: hi\n",
    )
    .unwrap();

    let template = Template::load(&template_path).unwrap();
    let err = PlanInputs::load(&template).unwrap_err();
    assert!(matches!(err, GenError::Resource(_)));
}

#[test]
fn test_plan_version_mismatch_is_rejected() {
    let temp = TempDir::new().unwrap();
    let products = temp.path().join("products");
    fs::create_dir_all(&products).unwrap();
    fs::write(products.join("a.jpg"), b"img").unwrap();
    let template_path = temp.path().join("task.yaml");
    fs::write(
        &template_path,
        "name: v\nmode: scene_generation\ngroup_count: 1\nproduct_images:\n  source_dir: products\nscene_prompts:\n  custom_template: hi\n",
    )
    .unwrap();
    let template = Template::load(&template_path).unwrap();
    let inputs = PlanInputs::load(&template).unwrap();

    let mut plan = build_plan(&template, &inputs, "v".to_string()).unwrap();
    plan.version = PLAN_VERSION + 1;
    let err = plan.check_loaded().unwrap_err();
    assert!(matches!(err, GenError::Persistence(_)));
}
