//! End-to-end template scenarios

use chrono::NaiveDate;
use indoc::indoc;
use pretty_assertions::assert_eq;
use rstest::rstest;
use twoway_core::{Bean, EngineConfig, ParameterMap, Value, ValueType};

use super::{BoundQuery, ErrorCategory, ErrorKind, Parameters, Template, TemplateError, TwoWayEngine};

fn pmb(entries: &[(&str, Value)]) -> Parameters {
    let map: ParameterMap = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Parameters::new().with("pmb", Value::Map(map))
}

fn render(source: &str, params: &Parameters) -> Result<BoundQuery, TemplateError> {
    TwoWayEngine::default().render_str(source, params)
}

fn render_with(config: EngineConfig, source: &str, params: &Parameters) -> Result<BoundQuery, TemplateError> {
    TwoWayEngine::new(config).render_str(source, params)
}

#[derive(Debug)]
struct Member {
    name: String,
    birthdate: Option<NaiveDate>,
    active: bool,
}

impl Bean for Member {
    fn type_name(&self) -> &str {
        "Member"
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "birthdate" => Some(Value::from(self.birthdate)),
            _ => None,
        }
    }

    fn call(&self, method: &str) -> Option<Value> {
        match method {
            "isActive" => Some(Value::Bool(self.active)),
            _ => None,
        }
    }

    fn property_type(&self, name: &str) -> Option<ValueType> {
        match name {
            "name" => Some(ValueType::String),
            "birthdate" => Some(ValueType::Date),
            _ => None,
        }
    }

    fn property_names(&self) -> Vec<String> {
        vec!["name".into(), "birthdate".into()]
    }
}

const MEMBER_SEARCH: &str = "select * from MEMBER /*BEGIN*/where /*IF pmb.id != null*/MEMBER_ID = /*pmb.id*/3/*END*//*IF pmb.name != null*/ and MEMBER_NAME = /*pmb.name*/'x'/*END*//*END*/";

#[rstest]
#[case(Value::Int64(3), Value::from("S"), "select * from MEMBER where MEMBER_ID = ? and MEMBER_NAME = ?", 2)]
#[case(Value::Null, Value::from("S"), "select * from MEMBER where MEMBER_NAME = ?", 1)]
#[case(Value::Int64(3), Value::Null, "select * from MEMBER where MEMBER_ID = ?", 1)]
#[case(Value::Null, Value::Null, "select * from MEMBER ", 0)]
fn test_begin_prunes_and_adjusts_connector(
    #[case] id: Value,
    #[case] name: Value,
    #[case] expected_sql: &str,
    #[case] binds: usize,
) {
    let query = render(MEMBER_SEARCH, &pmb(&[("id", id), ("name", name)])).unwrap();
    assert_eq!(query.sql, expected_sql);
    assert_eq!(query.values.len(), binds);
    assert_eq!(query.types.len(), binds);
    assert_eq!(query.sql.matches('?').count(), query.values.len());
}

#[test]
fn test_apostrophe_in_line_comment_before_bind() {
    let query = render(
        "-- member's search\nselect * from MEMBER where ID = /*pmb.id*/3",
        &pmb(&[("id", Value::Int64(7))]),
    )
    .unwrap();
    assert_eq!(query.sql, "-- member's search\nselect * from MEMBER where ID = ?");
    assert_eq!(query.values, vec![Value::Int64(7)]);
}

#[test]
fn test_apostrophe_in_line_comment_inside_if_body() {
    let source = indoc! {"
        select * from MEMBER /*BEGIN*/where /*IF pmb.id != null*/ID = /*pmb.id*/3 -- don't
        /*END*//*END*/"};
    let query = render(source, &pmb(&[("id", Value::Int64(7))])).unwrap();
    assert_eq!(query.sql, "select * from MEMBER where ID = ? -- don't\n");
    assert_eq!(query.values, vec![Value::Int64(7)]);
    assert_eq!(query.display_sql(), "select * from MEMBER where ID = 7 -- don't\n");

    let query = render(source, &pmb(&[("id", Value::Null)])).unwrap();
    assert_eq!(query.sql, "select * from MEMBER ");
}

#[test]
fn test_connector_kept_when_adjustment_disabled() {
    let query = render_with(
        EngineConfig::default().with_adjust_connector(false),
        MEMBER_SEARCH,
        &pmb(&[("id", Value::Null), ("name", Value::from("S"))]),
    )
    .unwrap();
    assert_eq!(query.sql, "select * from MEMBER where  and MEMBER_NAME = ?");
}

#[test]
fn test_begin_without_content_emits_nothing() {
    let query = render(
        "/*BEGIN*/AND /*IF pmb.x != null*/X = ?/*END*//*END*/",
        &pmb(&[("x", Value::Null)]),
    )
    .unwrap();
    assert_eq!(query.sql, "");
    assert!(query.values.is_empty());
}

#[test]
fn test_else_branch_counts_as_content() {
    let source = "select * from MEMBER /*BEGIN*/where /*IF pmb.flag*/A = 1/*ELSE*/B = 2/*END*//*END*/";
    let query = render(source, &pmb(&[("flag", Value::Bool(false))])).unwrap();
    assert_eq!(query.sql, "select * from MEMBER where B = 2");
    let query = render(source, &pmb(&[("flag", Value::Bool(true))])).unwrap();
    assert_eq!(query.sql, "select * from MEMBER where A = 1");
}

#[test]
fn test_rendering_is_deterministic_across_threads() {
    let template = Template::parse(MEMBER_SEARCH).unwrap();
    let params = pmb(&[("id", Value::Int64(3)), ("name", Value::from("S"))]);
    let engine = TwoWayEngine::default();
    let first = engine.render(&template, &params).unwrap();
    assert_eq!(engine.render(&template, &params).unwrap(), first);

    let (engine, template, params) = (&engine, &template, &params);
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(move || engine.render(template, params).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), first);
        }
    });
}

#[rstest]
#[case(vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)], "(?, ?, ?)", 3)]
#[case(vec![Value::Int64(1), Value::Null, Value::Int64(3)], "(?, ?)", 2)]
fn test_list_expansion(#[case] ids: Vec<Value>, #[case] placeholders: &str, #[case] binds: usize) {
    let query = render(
        "select * from MEMBER where MEMBER_ID in /*pmb.ids*/(1, 2)",
        &pmb(&[("ids", Value::List(ids))]),
    )
    .unwrap();
    assert_eq!(query.sql, format!("select * from MEMBER where MEMBER_ID in {placeholders}"));
    assert_eq!(query.values.len(), binds);
    assert!(query.values.iter().all(|v| !v.is_null()));
    assert!(query.types.iter().all(|t| *t == ValueType::BigInt));
}

#[rstest]
#[case(Value::List(vec![]), ErrorKind::EmptyList)]
#[case(Value::List(vec![Value::Null, Value::Null]), ErrorKind::NullOnlyList)]
#[case(Value::Null, ErrorKind::ListValueNull)]
#[case(Value::Int64(1), ErrorKind::ListExpected { type_name: "bigint".into() })]
fn test_list_expansion_rejections(#[case] ids: Value, #[case] expected: ErrorKind) {
    let err = render(
        "where MEMBER_ID in /*pmb.ids*/(1, 2)",
        &pmb(&[("ids", ids)]),
    )
    .unwrap_err();
    assert_eq!(err.kind, expected);
    assert_eq!(err.category(), ErrorCategory::ValuePolicy);
    assert_eq!(err.expression, "pmb.ids");
}

#[test]
fn test_scalar_placeholder_rejects_list() {
    let err = render(
        "where MEMBER_ID = /*pmb.ids*/1",
        &pmb(&[("ids", Value::from(vec![1i64, 2]))]),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ScalarExpected { type_name: "list".into() });
}

#[test]
fn test_and_short_circuit_skips_unresolvable_clause() {
    let query = render(
        "/*IF pmb.a != null && pmb.b.c != null*/X/*END*/",
        &pmb(&[("a", Value::Null), ("b", Value::Null)]),
    )
    .unwrap();
    assert_eq!(query.sql, "");
}

#[rstest]
#[case("/*IF pmb.n == 3.0*/X/*END*/", Value::Int32(3), "X")]
#[case("/*IF pmb.n > 5*/X/*END*/", Value::Null, "")]
#[case("/*IF 5 > pmb.n*/X/*END*/", Value::Null, "X")]
#[case("/*IF pmb.n >= null*/X/*END*/", Value::Null, "X")]
#[case("/*IF pmb.n != 3*/X/*END*/", Value::Float64(3.5), "X")]
fn test_if_comparisons(#[case] source: &str, #[case] n: Value, #[case] expected: &str) {
    let query = render(source, &pmb(&[("n", n)])).unwrap();
    assert_eq!(query.sql, expected);
}

#[test]
fn test_string_ordering_is_unsupported() {
    let err = render("/*IF 'a' > 'b'*/X/*END*/", &Parameters::new()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnsupportedComparison { .. }));
    assert_eq!(err.category(), ErrorCategory::Comparison);
    assert_eq!(err.clause.as_deref(), Some("'a' > 'b'"));
}

#[test]
fn test_loop_like_prefix_on_bind_and_embedded() {
    let params = pmb(&[("names", Value::from(vec!["a", "b"]))]);

    let query = render(
        "where /*FOR pmb.names:likePrefix*//*NEXT 'or '*/NAME like /*#current*/'a' /*END*/",
        &params,
    )
    .unwrap();
    assert_eq!(query.sql, "where NAME like ? escape '|' or NAME like ? escape '|' ");
    assert_eq!(query.values, vec![Value::from("a%"), Value::from("b%")]);
    assert_eq!(query.types, vec![ValueType::String, ValueType::String]);

    let query = render(
        "where /*FOR pmb.names:likePrefix*//*NEXT 'or '*/NAME like /*$#current*/'a' /*END*/",
        &params,
    )
    .unwrap();
    assert_eq!(query.sql, "where NAME like 'a%' escape '|' or NAME like 'b%' escape '|' ");
    assert!(query.values.is_empty());
}

#[test]
fn test_not_like_suppresses_loop_option() {
    let query = render(
        "/*FOR pmb.names:likeContain*/N = /*#current:notLike*/'a' /*END*/",
        &pmb(&[("names", Value::from(vec!["50%"]))]),
    )
    .unwrap();
    assert_eq!(query.sql, "N = ? ");
    assert_eq!(query.values, vec![Value::from("50%")]);
}

#[test]
fn test_like_escape_from_config() {
    let query = render_with(
        EngineConfig::default().with_like_escape('#'),
        "where NAME like /*pmb.name:likeContain*/'x'",
        &pmb(&[("name", Value::from("50%_off"))]),
    )
    .unwrap();
    assert_eq!(query.sql, "where NAME like ? escape '#'");
    assert_eq!(query.values, vec![Value::from("%50#%#_off%")]);
}

#[test]
fn test_loop_variable_out_of_scope() {
    let err = render(
        "/*FOR pmb.names*/X/*END*/ and NAME = /*#current*/'a'",
        &pmb(&[("names", Value::from(vec!["a"]))]),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::LoopVariableOutsideLoop);
    assert_eq!(err.category(), ErrorCategory::Structural);
}

#[test]
fn test_loop_markers_build_a_list() {
    let query = render(
        "ID in /*FOR pmb.ids*//*FIRST*/(/*END*//*NEXT ', '*//*#current*/1/*LAST*/)/*END*//*END*/",
        &pmb(&[("ids", Value::from(vec![1i64, 2, 3]))]),
    )
    .unwrap();
    assert_eq!(query.sql, "ID in (?, ?, ?)");
    assert_eq!(query.values, vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]);
}

#[test]
fn test_if_inside_loop_uses_current_element() {
    let query = render(
        "/*FOR pmb.names*//*IF #current != 'b'*//*#current*/'x' /*END*//*END*/",
        &pmb(&[("names", Value::from(vec!["a", "b", "c"]))]),
    )
    .unwrap();
    assert_eq!(query.sql, "? ? ");
    assert_eq!(query.values, vec![Value::from("a"), Value::from("c")]);
}

#[test]
fn test_nested_loops_inherit_like_option() {
    let groups = Value::List(vec![
        Value::from(vec!["a", "b"]),
        Value::from(vec!["c"]),
    ]);
    let query = render(
        "/*FOR pmb.groups:likeSuffix*/(/*FOR #current*//*NEXT ' or '*/N like /*#current*/'x'/*END*/)/*END*/",
        &pmb(&[("groups", groups)]),
    )
    .unwrap();
    assert_eq!(
        query.sql,
        "(N like ? escape '|' or N like ? escape '|')(N like ? escape '|')"
    );
    assert_eq!(
        query.values,
        vec![Value::from("%a"), Value::from("%b"), Value::from("%c")]
    );
}

#[test]
fn test_for_source_must_be_a_list() {
    let err = render("/*FOR pmb.name*/X/*END*/", &pmb(&[("name", Value::from("a"))])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ForSourceNotList { type_name: "string".into() });
}

#[rstest]
#[case("where NAME = /*$pmb.value*/'x'", Value::from("O'Brien"), "where NAME = 'O''Brien'")]
#[case("limit /*$pmb.value*/10", Value::Int32(20), "limit 20")]
#[case("limit /*$pmb.value*/10", Value::Null, "limit null")]
#[case("order by /*$pmb.value*/ID asc", Value::from("NAME"), "order by NAME asc")]
#[case("select * from /*$$pmb.value*/MEMBER", Value::from("dbo."), "select * from dbo.MEMBER")]
#[case("select * from /*$.pmb.value*/dbo.MEMBER", Value::from("main"), "select * from main.MEMBER")]
#[case("where NAME in /*$pmb.value*/('a', 'b')", Value::from(vec![Some("x"), None, Some("y")]), "where NAME in ('x', 'y')")]
#[case("where ID in /*$pmb.value*/(1, 2)", Value::from(vec![7i64, 8]), "where ID in (7, 8)")]
fn test_embedded_values(#[case] source: &str, #[case] value: Value, #[case] expected: &str) {
    let query = render(source, &pmb(&[("value", value)])).unwrap();
    assert_eq!(query.sql, expected);
    assert!(query.values.is_empty());
}

#[test]
fn test_embedded_bind_symbol_is_rejected() {
    let err = render(
        "where NAME = /*$pmb.name*/'x'",
        &pmb(&[("name", Value::from("a?b"))]),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BindSymbolInEmbedded { value: "a?b".into() });
}

#[test]
fn test_dynamic_embedding_binds_against_root_object() {
    let query = render(
        "select * from MEMBER where /*$pmb.condition*/X",
        &pmb(&[
            ("condition", Value::from("MEMBER_ID = /*pmb.id*/1")),
            ("id", Value::Int64(7)),
        ]),
    )
    .unwrap();
    assert_eq!(query.sql, "select * from MEMBER where MEMBER_ID = ?");
    assert_eq!(query.values, vec![Value::Int64(7)]);
    assert_eq!(query.types, vec![ValueType::BigInt]);
}

#[test]
fn test_dynamic_embedding_depth_guard() {
    let err = render_with(
        EngineConfig::default().with_max_dynamic_depth(2),
        "where /*$pmb.again*/X",
        &pmb(&[("again", Value::from("/*$pmb.again*/X"))]),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DynamicDepthExceeded { max: 2 });
}

#[rstest]
#[case("where ID = /*pmb.id*/3")]
#[case("limit /*$pmb.id*/10")]
fn test_null_blocking(#[case] source: &str) {
    let params = pmb(&[("id", Value::Null)]);
    assert!(render(source, &params).is_ok());

    let err = render_with(EngineConfig::default().with_block_null_parameter(true), source, &params)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NullBlocked);
}

#[test]
fn test_declared_type_for_null_argument() {
    let params = Parameters::new()
        .with("memberId", Value::Null)
        .with_type("memberId", ValueType::BigInt);
    let query = render("where MEMBER_ID = /*memberId*/3", &params).unwrap();
    assert_eq!(query.values, vec![Value::Null]);
    assert_eq!(query.types, vec![ValueType::BigInt]);
}

#[test]
fn test_bean_properties_and_methods() {
    let member = Value::bean(Member {
        name: "Stojkovic".into(),
        birthdate: None,
        active: true,
    });
    let source = indoc! {"
        select * from MEMBER
        where MEMBER_NAME = /*member.name*/'x'
          and BIRTHDATE = /*member.birthdate*/'2000-01-01'
        /*IF member.isActive()*/  and STATUS = 'FML'/*END*/"};
    let query = render(source, &Parameters::new().with("member", member)).unwrap();
    assert_eq!(
        query.sql,
        indoc! {"
            select * from MEMBER
            where MEMBER_NAME = ?
              and BIRTHDATE = ?
              and STATUS = 'FML'"}
    );
    assert_eq!(query.values, vec![Value::from("Stojkovic"), Value::Null]);
    assert_eq!(query.types, vec![ValueType::String, ValueType::Date]);
}

#[test]
fn test_bean_errors_name_the_type() {
    let member = Value::bean(Member {
        name: "a".into(),
        birthdate: None,
        active: false,
    });
    let params = Parameters::new().with("member", member);

    let err = render("where X = /*member.email*/'x'", &params).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::PropertyNotFound {
            type_name: "Member".into(),
            property: "email".into()
        }
    );
    assert!(err.parameters.starts_with("member=Member{name: \"a\""));

    let err = render("/*IF member.isDeleted()*/X/*END*/", &params).unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::MethodNotFound {
            type_name: "Member".into(),
            method: "isDeleted".into()
        }
    );
}

#[test]
fn test_missing_argument_is_a_resolution_error() {
    let err = render("where ID = /*pmb.id*/3", &Parameters::new()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ArgumentNotFound { name: "pmb".into() });
    assert_eq!(err.category(), ErrorCategory::Resolution);
    assert_eq!(err.template, "where ID = /*pmb.id*/3");
    assert_eq!(err.parameters, "(none)");
}

#[test]
fn test_display_sql_inlines_binds() {
    let query = render(
        MEMBER_SEARCH,
        &pmb(&[("id", Value::Int64(3)), ("name", Value::from("O'Brien"))]),
    )
    .unwrap();
    assert_eq!(
        query.display_sql(),
        "select * from MEMBER where MEMBER_ID = 3 and MEMBER_NAME = 'O''Brien'"
    );
}

#[test]
fn test_template_introspection() {
    let source = "/*IF pmb.a != null*/A = /*member.name*/'x'/*END*//*FOR pmb.list*//*#current*/1/*END*/";
    let template = Template::parse(source).unwrap();
    assert_eq!(template.source(), source);
    assert_eq!(template.nodes().len(), 2);
    assert_eq!(template.argument_names(), vec!["pmb", "member"]);
}
