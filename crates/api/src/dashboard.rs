//! Server-rendered HTML for the dashboard page.

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;
use upside_core::domain::quote::StockQuote;
use upside_core::screen::{ScreenOptions, ScreenParams, SortKey, FORM_MARKER};

const TITLE: &str = "Stock Analyst Upside Finder";

const STYLE: &str = "body{font-family:sans-serif;margin:0;display:flex}\
aside{width:260px;padding:16px;background:#f4f5f7;min-height:100vh}\
main{flex:1;padding:16px;overflow-x:auto}\
fieldset{border:none;padding:0;margin:0 0 12px}\
legend,label.h{font-weight:bold;display:block;margin-bottom:4px}\
table{border-collapse:collapse;font-size:14px}\
th,td{padding:4px 8px;border-bottom:1px solid #ddd;text-align:right}\
td.l,th.l{text-align:left}\
.metric{font-size:28px;margin:8px 0 16px}";

pub fn render_page(
    options: &ScreenOptions,
    params: &ScreenParams,
    rows: &[StockQuote],
    loaded_at: Option<DateTime<Utc>>,
) -> String {
    let mut out = String::with_capacity(4096 + rows.len() * 512);
    head(&mut out);

    out.push_str("<aside><form method=\"post\" action=\"/refresh\">");
    out.push_str("<button type=\"submit\">Refresh Data</button></form>");
    if let Some(ts) = loaded_at {
        let _ = write!(out, "<p><small>Loaded {}</small></p>", ts.format("%Y-%m-%d %H:%M UTC"));
    }
    out.push_str("<h3>Filter Options</h3><form method=\"get\" action=\"/\">");
    filter_form(&mut out, options, params);
    out.push_str("</form></aside>");

    let _ = write!(out, "<main><h1>{}</h1>", encode_text(TITLE));
    let _ = write!(out, "<div>Stocks Found</div><div class=\"metric\">{}</div>", rows.len());
    results_table(&mut out, rows);
    out.push_str("</main></body></html>");
    out
}

pub fn render_error(message: &str) -> String {
    let mut out = String::new();
    head(&mut out);
    let _ = write!(
        out,
        "<main><h1>{}</h1><p style=\"color:#b00020\">{}</p>\
         <form method=\"post\" action=\"/refresh\"><button type=\"submit\">Refresh Data</button></form>\
         </main></body></html>",
        encode_text(TITLE),
        encode_text(message)
    );
    out
}

fn head(out: &mut String) {
    let _ = write!(
        out,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title>\
         <style>{STYLE}</style></head><body>",
        encode_text(TITLE)
    );
}

fn filter_form(out: &mut String, options: &ScreenOptions, params: &ScreenParams) {
    // Unchecked boxes submit nothing; the marker tells the server the set was explicit.
    let _ = write!(
        out,
        "<input type=\"hidden\" name=\"{FORM_MARKER}\" value=\"1\">\
         <fieldset><legend>Filter by Sector</legend>"
    );
    for sector in &options.sectors {
        let checked = params.sectors.as_ref().map_or(true, |s| s.contains(sector));
        checkbox(out, "sector", sector, checked);
    }
    out.push_str("</fieldset>");

    let _ = write!(
        out,
        "<fieldset><label class=\"h\" for=\"min_analysts\">Minimum No. of Analysts: \
         <output id=\"ma_out\">{v}</output></label>\
         <input type=\"range\" id=\"min_analysts\" name=\"min_analysts\" min=\"0\" max=\"{max}\" \
         value=\"{v}\" oninput=\"ma_out.value=this.value\"></fieldset>",
        v = params.min_analysts.min(options.max_analysts),
        max = options.max_analysts,
    );

    number_input(out, "min_upside", "Minimum Upside Potential (%)", params.min_upside);
    number_input(out, "min_dividend", "Minimum Dividend Yield (%)", params.min_dividend);

    out.push_str("<fieldset><legend>Filter by Rating Label</legend>");
    for rating in &options.ratings {
        let checked = params.ratings.as_ref().map_or(true, |r| r.contains(rating));
        checkbox(out, "rating", rating, checked);
    }
    out.push_str("</fieldset>");

    out.push_str("<fieldset><legend>Sort By</legend>");
    for key in SortKey::ALL {
        let _ = write!(
            out,
            "<label><input type=\"radio\" name=\"sort\" value=\"{}\"{}> {}</label><br>",
            key.as_str(),
            if key == params.sort { " checked" } else { "" },
            encode_text(key.label()),
        );
    }
    out.push_str("</fieldset><button type=\"submit\">Apply</button>");
}

fn checkbox(out: &mut String, name: &str, value: &str, checked: bool) {
    let _ = write!(
        out,
        "<label><input type=\"checkbox\" name=\"{name}\" value=\"{}\"{}> {}</label><br>",
        encode_double_quoted_attribute(value),
        if checked { " checked" } else { "" },
        encode_text(value),
    );
}

fn number_input(out: &mut String, name: &str, label: &str, value: f64) {
    let _ = write!(
        out,
        "<fieldset><label class=\"h\" for=\"{name}\">{}</label>\
         <input type=\"number\" step=\"any\" id=\"{name}\" name=\"{name}\" value=\"{value}\"></fieldset>",
        encode_text(label),
    );
}

fn results_table(out: &mut String, rows: &[StockQuote]) {
    out.push_str(
        "<table><thead><tr><th class=\"l\">Ticker</th><th>Price</th><th class=\"l\">Currency</th>\
         <th>Target</th><th>Upside %</th><th>Analysts</th><th>Strong Buy</th><th>Buy</th>\
         <th>Hold</th><th>Sell</th><th>Strong Sell</th><th class=\"l\">Rating</th>\
         <th class=\"l\">Sector</th><th>Trailing P/E</th><th>Forward P/E</th><th>Div Yield</th>\
         </tr></thead><tbody>",
    );

    for q in rows {
        let _ = write!(
            out,
            "<tr><td class=\"l\">{}</td><td>{}</td><td class=\"l\">{}</td><td>{}</td>\
             <td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td class=\"l\">{}</td><td class=\"l\">{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            encode_text(&q.ticker),
            money(q.price),
            encode_text(&q.currency),
            money(q.target_price),
            percent(q.upside_potential),
            q.num_analysts,
            q.strong_buy,
            q.buy,
            q.hold,
            q.sell,
            q.strong_sell,
            encode_text(&q.rating),
            encode_text(&q.sector),
            ratio(q.trailing_pe),
            ratio(q.forward_pe),
            percent(q.dividend_yield),
        );
    }

    out.push_str("</tbody></table>");
}

fn money(v: f64) -> String {
    format!("${v:.2}")
}

fn percent(v: f64) -> String {
    format!("{v:.2} %")
}

fn ratio(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.1}")).unwrap_or_default()
}
