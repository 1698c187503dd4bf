//! Built-in card and document templates.
//!
//! Both are used only when the caller does not configure a template path.
//! A configured document template path that does not exist yet is seeded
//! with [`DEFAULT_DOCUMENT_TEMPLATE`] so operators have something to edit.

/// Default per-row card template.
///
/// Placeholders are `{{ name }}` tokens filled by
/// [`crate::pipeline::template::render_placeholders`]. The front-matter keys
/// are the ones [`crate::pipeline::cards::parse_card`] reads back.
pub const DEFAULT_CARD_TEMPLATE: &str = r#"---
title: {{title}}
contact: {{contact}}
organization: {{organization}}
description: |
  {{description}}
funders: {{funders}}
feasibility: {{feasibility}}
opportunities: |
  {{opportunities}}
challenges: |
  {{challenges}}
qr_code_filename: {{qr_code_filename}}
weblink: {{weblink}}
---

# {{title}}

**Contact:** {{contact}} ({{organization}})

{{description}}

![Location QR code]({{qr_code}})
"#;

/// Default LaTeX document template (minijinja / Jinja2 syntax).
///
/// One framed block per card, `\pagebreak` between blocks but not after the
/// last. Free text goes through the `latex` filter; the QR path does not,
/// because `\includegraphics` takes it verbatim.
pub const DEFAULT_DOCUMENT_TEMPLATE: &str = r#"\documentclass[a4paper]{article}
\usepackage{graphicx}
\usepackage{geometry}
\usepackage{fancyhdr}
\usepackage{hyperref}
\usepackage{mdframed}

\geometry{margin=1cm}
\pagestyle{fancy}
\fancyhf{}
\renewcommand{\headrulewidth}{0pt}

\begin{document}
{% for card in cards %}
\begin{mdframed}
  \section*{ {{- card.title | latex -}} }
  \textbf{Contact:} {{ card.contact | latex }}

  \textbf{Organization:} {{ card.organization | latex }}

  \textbf{Description:} {{ card.description | latex }}

  \textbf{Potential Funders:} {{ card.funders | latex }}

  \textbf{Feasible in next 3 years?} {{ card.feasibility | latex }}

  \textbf{Opportunities:} {{ card.opportunities | latex }}

  \textbf{Challenges:} {{ card.challenges | latex }}

  \vspace{0.5cm}
  \begin{center}
    \includegraphics[width=3cm]{ {{- card.qr_code -}} }
  \end{center}
\end{mdframed}
{% if not loop.last %}
\pagebreak
{% endif %}
{%- endfor %}

\end{document}
"#;

/// Page-break marker emitted by [`DEFAULT_DOCUMENT_TEMPLATE`].
pub const PAGE_BREAK: &str = "\\pagebreak";
