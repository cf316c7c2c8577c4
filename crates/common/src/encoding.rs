/// Repair a filename whose UTF-8 bytes were decoded as ISO-8859-1.
///
/// Multipart filenames that travel through encoding-unaware layers often
/// arrive with every UTF-8 byte turned into its own Latin-1 char
/// (`报告.pdf` shows up as `æ\u{8a}¥å\u{91}\u{8a}.pdf`). Each char is mapped
/// back to its byte and the bytes are decoded as UTF-8. Anything that cannot
/// have come from that code page, or does not decode, is returned unchanged.
pub fn fix(name: &str) -> String {
    let mut bytes = Vec::with_capacity(name.len());
    for c in name.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(byte) => bytes.push(byte),
            Err(_) => return name.to_string(),
        }
    }
    match String::from_utf8(bytes) {
        Ok(repaired) => repaired,
        Err(_) => name.to_string(),
    }
}
