//! Fixture archives shared by the unit tests

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const FRIENDS_MANIFEST: &[u8] = b"Manifest-Version: 1.0\r\n\
OpenIDE-Module: org.netbeans.modules.web.common\r\n\
OpenIDE-Module-Friends: foo.bar\r\n\
OpenIDE-Module-Specification-Version: 1.57\r\n\
\r\n";

pub const PLAIN_MANIFEST: &[u8] = b"Manifest-Version: 1.0\r\nCreated-By: test\r\n\r\n";

/// Write a JAR with an optional manifest followed by a fixed set of entries
pub fn write_jar(path: &Path, manifest: Option<&[u8]>) {
    write_jar_named(path, "META-INF/MANIFEST.MF", manifest);
}

pub fn write_jar_named(path: &Path, manifest_name: &str, manifest: Option<&[u8]>) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    writer.add_directory("META-INF/", stored).unwrap();
    if let Some(manifest) = manifest {
        writer.start_file(manifest_name, deflated).unwrap();
        writer.write_all(manifest).unwrap();
    }
    writer.start_file("org/example/Api.class", deflated).unwrap();
    writer.write_all(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52]).unwrap();
    writer.start_file("org/example/Bundle.properties", stored).unwrap();
    writer.write_all(b"OpenIDE-Module-Name=Example\n").unwrap();
    writer.start_file("docs/readme.txt", deflated).unwrap();
    writer.write_all("hello ".repeat(500).as_bytes()).unwrap();
    writer.finish().unwrap();
}

/// Entry names, contents and compression methods in archive order
pub fn read_entries(path: &Path) -> Vec<(String, Vec<u8>, CompressionMethod)> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        entries.push((entry.name().to_string(), data, entry.compression()));
    }
    entries
}

/// Entries other than the manifest
pub fn non_manifest_entries(path: &Path) -> Vec<(String, Vec<u8>, CompressionMethod)> {
    read_entries(path)
        .into_iter()
        .filter(|(name, _, _)| !crate::manifest::is_manifest_path(name))
        .collect()
}

/// Contents of the manifest entry, if any
pub fn manifest_bytes(path: &Path) -> Option<Vec<u8>> {
    read_entries(path)
        .into_iter()
        .find(|(name, _, _)| crate::manifest::is_manifest_path(name))
        .map(|(_, data, _)| data)
}
