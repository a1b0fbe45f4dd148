//! End-to-end conversion of a synthesized minimal cartridge.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use cc2olx::cli::convert_one_file;
use cc2olx::{Cartridge, ConversionConfig, OlxExport};

const MANIFEST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest xmlns="http://www.imsglobal.org/xsd/imsccv1p1/imscp_v1p1" identifier="m1">
  <metadata>
    <schema>IMS Common Cartridge</schema>
    <schemaversion>1.1.0</schemaversion>
    <lom xmlns="http://ltsc.ieee.org/xsd/imsccv1p1/LOM/manifest">
      <general>
        <title><string>Integration Course</string></title>
      </general>
    </lom>
  </metadata>
  <organizations>
    <organization identifier="org_1" structure="rooted-hierarchy">
      <item identifier="root">
        <item identifier="module_1">
          <title>Week 1</title>
          <item identifier="item_page" identifierref="res_page">
            <title>Welcome</title>
          </item>
          <item identifier="item_quiz" identifierref="res_quiz">
            <title>Quiz</title>
          </item>
        </item>
      </item>
    </organization>
  </organizations>
  <resources>
    <resource identifier="res_page" type="webcontent" href="web_resources/welcome.html">
      <file href="web_resources/welcome.html"/>
    </resource>
    <resource identifier="res_quiz" type="imsqti_xmlv1p2/imscc_xmlv1p1/assessment" href="quiz.xml">
      <file href="quiz.xml"/>
    </resource>
  </resources>
</manifest>
"#;

const PAGE_HTML: &str =
    r#"<html><body><p>Welcome! <img src="$IMS-CC-FILEBASE$/logo.png"/></p></body></html>"#;

const QUIZ_XML: &str = r#"<?xml version="1.0"?>
<questestinterop>
  <assessment ident="assess_1" title="Quiz">
    <section ident="root_section">
      <item ident="q1" title="Question 1">
        <itemmetadata>
          <qtimetadata>
            <qtimetadatafield>
              <fieldlabel>cc_profile</fieldlabel>
              <fieldentry>cc.multiple_choice.v0p1</fieldentry>
            </qtimetadatafield>
          </qtimetadata>
        </itemmetadata>
        <presentation>
          <material><mattext texttype="text/html">&lt;p&gt;Pick one&lt;/p&gt;</mattext></material>
          <response_lid ident="response1" rcardinality="Single">
            <render_choice>
              <response_label ident="a1"><material><mattext>Right</mattext></material></response_label>
              <response_label ident="a2"><material><mattext>Wrong</mattext></material></response_label>
            </render_choice>
          </response_lid>
        </presentation>
        <resprocessing>
          <respcondition>
            <conditionvar><varequal respident="response1">a1</varequal></conditionvar>
          </respcondition>
        </resprocessing>
      </item>
    </section>
  </assessment>
</questestinterop>
"#;

fn build_cartridge_archive(directory: &Path) -> PathBuf {
    let archive_path = directory.join("integration-course.imscc");
    let file = fs::File::create(&archive_path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    for (name, content) in [
        ("imsmanifest.xml", MANIFEST_XML),
        ("web_resources/welcome.html", PAGE_HTML),
        ("web_resources/logo.png", "png bytes"),
        ("quiz.xml", QUIZ_XML),
    ] {
        writer.start_file(name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();

    archive_path
}

#[test]
fn test_cartridge_loads_and_exports_olx() {
    let workspace = tempfile::tempdir().unwrap();
    let archive_path = build_cartridge_archive(workspace.path());

    let cartridge = Cartridge::load(&archive_path, workspace.path()).unwrap();
    assert_eq!(cartridge.title(), "Integration Course");
    assert!(!cartridge.is_canvas_flavor());

    let config = ConversionConfig::default();
    let mut export = OlxExport::new(&cartridge, &config).unwrap();
    let xml = export.xml().unwrap();

    assert!(xml.contains(r#"<chapter url_name="module_1" display_name="Week 1">"#));
    // The HTML page went through the filebase link rewrite.
    assert!(xml.contains(r#"src="/static/logo.png""#));
    // The QTI item became a multiple choice problem.
    assert!(xml.contains("<multiplechoiceresponse>"));
    assert!(xml.contains(r#"<choice correct="true">Right</choice>"#));
    assert!(xml.contains(r#"<choice correct="false">Wrong</choice>"#));

    let policy = export.policy();
    assert_eq!(policy["course/course"]["display_name"], "Integration Course");
}

#[test]
fn test_convert_one_file_produces_tar_gz() {
    let workspace = tempfile::tempdir().unwrap();
    let archive_path = build_cartridge_archive(workspace.path());
    let staging_dir = workspace.path().join("staging");
    fs::create_dir_all(&staging_dir).unwrap();

    let config = ConversionConfig::default();
    convert_one_file(&archive_path, workspace.path(), &staging_dir, &config).unwrap();

    let result_path = staging_dir.join("integration-course.tar.gz");
    assert!(result_path.exists());

    let mut archive = Archive::new(GzDecoder::new(fs::File::open(&result_path).unwrap()));
    let mut names = Vec::new();
    let mut course_xml = String::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        if name == "course.xml" {
            entry.read_to_string(&mut course_xml).unwrap();
        }
        names.push(name);
    }

    assert!(names.contains(&"course.xml".to_string()));
    assert!(names.contains(&"policies/course/policy.json".to_string()));
    assert!(names.iter().any(|name| name.starts_with("static/")));
    assert!(course_xml.contains("<multiplechoiceresponse>"));
}
