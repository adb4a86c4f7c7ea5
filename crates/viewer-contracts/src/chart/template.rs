use serde_json::Value;

/// Trace types the chart renderer accepts inside `layout.template.data`.
pub const SUPPORTED_TRACE_TYPES: &[&str] = &[
    "barpolar",
    "bar",
    "box",
    "candlestick",
    "carpet",
    "choroplethmapbox",
    "choropleth",
    "cone",
    "contourcarpet",
    "contour",
    "densitymapbox",
    "funnelarea",
    "funnel",
    "heatmapgl",
    "heatmap",
    "histogram2dcontour",
    "histogram2d",
    "histogram",
    "icicle",
    "image",
    "indicator",
    "isosurface",
    "mesh3d",
    "ohlc",
    "parcats",
    "parcoords",
    "pie",
    "pointcloud",
    "sankey",
    "scatter3d",
    "scattercarpet",
    "scattergeo",
    "scattergl",
    "scattermapbox",
    "scatterpolargl",
    "scatterpolar",
    "scatter",
    "scattersmith",
    "scatterternary",
    "splom",
    "streamtube",
    "sunburst",
    "surface",
    "table",
    "treemap",
    "violin",
    "volume",
    "waterfall",
];

const LEGACY_MAP_TRACE: &str = "scattermap";
const RENDERER_MAP_TRACE: &str = "scattermapbox";

/// What [`fix_template`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFix {
    pub renamed_scattermap: bool,
    pub removed: Vec<String>,
}

impl TemplateFix {
    pub fn is_noop(&self) -> bool {
        !self.renamed_scattermap && self.removed.is_empty()
    }
}

pub fn is_supported_trace_type(name: &str) -> bool {
    SUPPORTED_TRACE_TYPES.contains(&name)
}

/// Rewrites `layout.template.data` in place so the renderer accepts it:
/// `scattermap` becomes `scattermapbox` and unknown trace types are dropped.
/// Documents without template data are left untouched.
pub fn fix_template(figure: &mut Value) -> TemplateFix {
    let mut fix = TemplateFix::default();
    let Some(template_data) = figure
        .pointer_mut("/layout/template/data")
        .and_then(Value::as_object_mut)
    else {
        return fix;
    };

    if let Some(styles) = template_data.shift_remove(LEGACY_MAP_TRACE) {
        template_data.insert(RENDERER_MAP_TRACE.to_string(), styles);
        fix.renamed_scattermap = true;
    }

    template_data.retain(|name, _| {
        if is_supported_trace_type(name) {
            return true;
        }
        fix.removed.push(name.clone());
        false
    });

    if !fix.is_noop() {
        tracing::debug!(
            renamed_scattermap = fix.renamed_scattermap,
            removed = ?fix.removed,
            "pruned chart template trace types"
        );
    }
    fix
}
