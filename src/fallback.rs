//! Last-resort output when composition or rendering fails.

use chrono::{DateTime, Local};

pub const ERROR_PAGE_TITLE: &str = "PDF Generation Error";

/// A fixed, valid one-page PDF. Returned when even the error page cannot be drawn.
pub const MINIMAL_PDF: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>\nendobj\n\
4 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>\nendobj\n\
5 0 obj\n<< /Length 51 >>\nstream\n\
BT /F1 18 Tf 72 770 Td (PDF Generation Error) Tj ET\n\
endstream\nendobj\n\
xref\n0 6\n\
0000000000 65535 f \n\
0000000009 00000 n \n\
0000000058 00000 n \n\
0000000115 00000 n \n\
0000000241 00000 n \n\
0000000311 00000 n \n\
trailer\n<< /Size 6 /Root 1 0 R >>\n\
startxref\n412\n%%EOF\n";

/// HTML for the error page: the fixed heading, the error message and when it happened.
pub fn error_page_html(message: &str, at: DateTime<Local>) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{ERROR_PAGE_TITLE}</title></head>\n<body>\n\
         <h1>{ERROR_PAGE_TITLE}</h1>\n<p>Error: {}</p>\n<p>Time: {}</p>\n</body>\n</html>\n",
        html_escape::encode_text(message),
        at.format("%Y-%m-%d %H:%M:%S%.6f"),
    )
}
