use handlebars::{handlebars_helper, Handlebars, TemplateError};
use serde_json::Value;

/// Page and fragment templates, registered under their short names.
const TEMPLATES: &[(&str, &str)] = &[
    ("page_header", include_str!("../templates/page_header.hbs")),
    ("page_footer", include_str!("../templates/page_footer.hbs")),
    ("index", include_str!("../templates/index.hbs")),
    ("account_settings", include_str!("../templates/account_settings.hbs")),
    ("teams_block", include_str!("../templates/teams_block.hbs")),
    ("materials_page", include_str!("../templates/materials_page.hbs")),
    ("materials_container", include_str!("../templates/materials_container.hbs")),
    ("materials_table", include_str!("../templates/materials_table.hbs")),
    ("material_form", include_str!("../templates/material_form.hbs")),
    ("material_success", include_str!("../templates/material_success.hbs")),
    ("import_form", include_str!("../templates/import_form.hbs")),
    ("assemblies_page", include_str!("../templates/assemblies_page.hbs")),
    ("assembly_detail", include_str!("../templates/assembly_detail.hbs")),
    ("assembly_name", include_str!("../templates/assembly_name.hbs")),
    ("assembly_sidebar", include_str!("../templates/assembly_sidebar.hbs")),
    ("assembly_add_button", include_str!("../templates/assembly_add_button.hbs")),
    ("layer", include_str!("../templates/layer.hbs")),
];

pub fn get_handlebars() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();

    handlebars_helper!(exists: |v: Value| !v.is_null());
    handlebars.register_helper("exists", Box::new(exists));

    handlebars_helper!(isnull: |v: Value| v.is_null());
    handlebars.register_helper("isnull", Box::new(isnull));

    handlebars_helper!(stringeq: |s1: String, s2: String| s1.eq(&s2));
    handlebars.register_helper("stringeq", Box::new(stringeq));

    handlebars_helper!(numeq: |a: i64, b: i64| a == b);
    handlebars.register_helper("numeq", Box::new(numeq));

    handlebars_helper!(fixed: |v: f64, digits: u64| format!("{:.*}", digits as usize, v));
    handlebars.register_helper("fixed", Box::new(fixed));

    handlebars
}

/// Registry with the helpers above and every page/fragment template.
pub fn get_portal_handlebars() -> Result<Handlebars<'static>, TemplateError> {
    let mut handlebars = get_handlebars();
    for (name, source) in TEMPLATES {
        handlebars.register_template_string(name, source)?;
    }
    Ok(handlebars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handlebars_can_render() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template("Hello {{name}}", &json!({"name": "foo"}))
            .expect("This to render");
        assert_eq!(res, "Hello foo");
    }

    #[test]
    fn handlebars_helper_stringeq_can_render() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template(
                r#"{{#if (stringeq "IN" category)}}selected{{/if}}"#,
                &json!({"category": "IN"}),
            )
            .expect("This to render");
        assert_eq!(res, "selected");
    }

    #[test]
    fn handlebars_helper_numeq_can_render() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template(
                r#"{{#each ids as |id|}}{{#if (numeq id ../active)}}[{{id}}]{{else}}{{id}}{{/if}}{{/each}}"#,
                &json!({"ids": [1, 2, 3], "active": 2}),
            )
            .expect("This to render");
        assert_eq!(res, "1[2]3");
    }

    #[test]
    fn handlebars_helper_fixed_can_render() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template("{{fixed value 3}}", &json!({"value": 0.04}))
            .expect("This to render");
        assert_eq!(res, "0.040");
    }

    #[test]
    fn handlebars_helper_isnull_can_render() {
        let handlebars = get_handlebars();
        let res = handlebars
            .render_template(
                r#"{{#if (isnull material)}}-{{/if}}"#,
                &json!({"material": null}),
            )
            .expect("This to render");
        assert_eq!(res, "-");
    }

    #[test]
    fn portal_templates_all_register() {
        let handlebars = get_portal_handlebars().expect("templates to parse");
        for (name, _) in TEMPLATES {
            assert!(handlebars.has_template(name), "missing {}", name);
        }
    }

    #[test]
    fn assembly_detail_renders_layers_through_partial() {
        let handlebars = get_portal_handlebars().expect("templates to parse");
        let res = handlebars
            .render(
                "assembly_detail",
                &json!({
                    "project": {"id": 1, "uid": "abcd1234", "name": "P", "active": true},
                    "assembly": {"id": 2, "name": "Wall", "active": true},
                    "layers": [{
                        "id": 5,
                        "thickness_mm": 50.0,
                        "segments": [{
                            "id": 9,
                            "layer_id": 5,
                            "field_name": "form_9-material",
                            "material_name": null,
                            "options": [{"id": 3, "name": "Cork", "selected": true}]
                        }]
                    }]
                }),
            )
            .expect("This to render");
        assert!(res.contains("id=\"layer-5\""));
        assert!(res.contains("/assemblies/1/2/layers/5/delete-segment/9/"));
        assert!(res.contains("name=\"form_9-material\""));
        assert!(res.contains("<option value=\"3\" selected>Cork</option>"));
    }
}
