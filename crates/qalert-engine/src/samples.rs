//! Statically registered contexts merged into every monitoring run.

use qalert_core::{
  evaluation::{ContextMetrics, FailureTrend, RelatedObjects, RuleEvaluationContext},
  rule::AlertCategory,
};

fn strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| (*s).to_owned()).collect()
}

pub fn sample_contexts() -> Vec<RuleEvaluationContext> {
  vec![
    RuleEvaluationContext {
      source_issue_id: "SAMPLE-ISSUE-001".into(),
      title:           Some("钽电容器高温失效率异常".into()),
      issue_summary:   Some(
        "航天型号批次在 125℃ 条件下失效率攀升至 7%，需关注供应链批次一致性。".into(),
      ),
      category:        Some(AlertCategory::Environmental),
      manufacturer:    Some("AVX".into()),
      process_tags:    strings(&["problem_analysis", "root_cause_analysis"]),
      material_tags:   strings(&["tantalum"]),
      structure_tags:  strings(&["capacitor"]),
      function_tags:   strings(&["power"]),
      similarity:      None,
      related_objects: RelatedObjects {
        components: strings(&["TCN12345"]),
        batches:    strings(&["BATCH-2024-01"]),
        suppliers:  strings(&["AVX"]),
        projects:   strings(&["Satellite-A"]),
      },
      metrics:         ContextMetrics {
        affected_batches: Some(3.0),
        affected_units: Some(250.0),
        defect_rate: Some(7.0),
        failure_trend: Some(FailureTrend::Increasing),
        ..Default::default()
      },
    },
    RuleEvaluationContext {
      source_issue_id: "SAMPLE-ISSUE-002".into(),
      title:           Some("FPGA 低温封装裂纹预警".into()),
      issue_summary:   Some(
        "供应商返修数据显示，在 -55℃ 条件下封装边缘出现裂纹，疑似材料批次问题。".into(),
      ),
      category:        Some(AlertCategory::Process),
      manufacturer:    Some("Xilinx".into()),
      process_tags:    strings(&["corrective_action"]),
      material_tags:   strings(&["ceramic"]),
      structure_tags:  strings(&["fpga", "package"]),
      function_tags:   strings(&["digital"]),
      similarity:      None,
      related_objects: RelatedObjects {
        components: strings(&["XC7A200T"]),
        batches:    strings(&["LOT-778-02"]),
        suppliers:  strings(&["Xilinx"]),
        projects:   strings(&["Launcher-B"]),
      },
      metrics:         ContextMetrics {
        affected_batches: Some(1.0),
        affected_units: Some(40.0),
        defect_rate: Some(3.5),
        failure_trend: Some(FailureTrend::Stable),
        ..Default::default()
      },
    },
  ]
}
